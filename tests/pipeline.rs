use approx::assert_abs_diff_eq;
use ddobox::adaptive::{partition, AdaptiveSampler, Partition};
use ddobox::data::{DataHandler, SamplingKind, ScalingProvider};
use ddobox::expr::{Assignment, Expr, Model, Relation, Sense};
use ddobox::formulation::{
    formulate, optimize_through, Activation, BigM, FormulationParams, NeuralNetwork, Surrogate,
};
use linfa::ParamGuard;
use ndarray::{array, concatenate, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn init_logger() {
    let env = env_logger::Env::new().filter_or("DDOBOX_LOG", "info");
    let mut builder = env_logger::Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();
}

/// Evaluate the `var == expr` equalities in model order
fn sweep(model: &Model, point: &mut Assignment) {
    for c in model.constraints() {
        if let (Expr::Var(v), Relation::Eq) = (&c.lhs, c.relation) {
            let value = c.rhs.eval(point);
            point.set(*v, value);
        }
    }
}

/// Best one-hot simplex selection of a selection model, returns the selected inputs
fn select(model: &Model, nx: usize) -> anyhow::Result<Array1<f64>> {
    let mut best: Option<(f64, Assignment)> = None;
    for k in 0.. {
        let Some(selector) = model.find(&format!("selector[{k}]")) else {
            break;
        };
        let mut point = Assignment::zeros(model.n_vars());
        point.set(selector, 1.);
        sweep(model, &mut point);
        if !model.is_feasible(&point, 1e-9)? {
            continue;
        }
        let obj = model.objective_value(&point)?.unwrap_or(0.);
        if best.as_ref().map_or(true, |(b, _)| obj > *b) {
            best = Some((obj, point));
        }
    }
    let (_, point) = best.ok_or_else(|| anyhow::anyhow!("no feasible selection"))?;
    Ok(Array1::from_iter((0..nx).map(|i| {
        point.value(model.find(&format!("inputs[{i}]")).unwrap())
    })))
}

fn linear_response(x: &Array2<f64>) -> Array2<f64> {
    x.map_axis(Axis(1), |r| r[0] + 2. * r[1] - 0.5)
        .insert_axis(Axis(1))
}

#[test]
fn test_linear_model_through_data_scaling() -> anyhow::Result<()> {
    init_logger();
    let xlimits = array![[-1., 1.], [-1., 1.]];
    let mut data = DataHandler::init_with_rng(
        20,
        &xlimits,
        1,
        SamplingKind::Lhs,
        Xoshiro256Plus::seed_from_u64(42),
    )?;
    data.set_y(linear_response(data.x()))?;
    data.split(0.25)?;
    assert_eq!(data.n_train(), 15);
    let scaling = data.scale()?.clone();

    // exact fit of the response in standardized units
    let coefs = [1., 2.];
    let weights = Array2::from_shape_fn((1, 2), |(_, j)| {
        coefs[j] * scaling.x_std(j) / scaling.y_std(0)
    });
    let offset: f64 = (0..2).map(|j| coefs[j] * scaling.x_mean(j)).sum::<f64>() - 0.5;
    let bias = array![(offset - scaling.y_mean(0)) / scaling.y_std(0)];
    let surrogate = Surrogate::from(NeuralNetwork::new(
        vec![weights],
        vec![bias],
        Activation::Linear,
    )?);

    let pred = surrogate.predict(&scaling, &data.x_test())?;
    assert_abs_diff_eq!(pred, data.y_test().to_owned(), epsilon = 1e-9);

    let block = formulate(&surrogate, &scaling, false)?;
    let model = optimize_through(&block, &xlimits, 0, Sense::Maximize)?;
    assert!(model.is_linear());

    // maximum at the upper corner
    let mut point = Assignment::zeros(model.n_vars());
    for i in 0..2 {
        point.set(model.find(&format!("inputs[{i}]")).unwrap(), 1.);
        point.set(model.find(&format!("surrogate.inputs[{i}]")).unwrap(), 1.);
    }
    sweep(&model, &mut point);
    assert!(model.is_feasible(&point, 1e-9)?);
    assert_abs_diff_eq!(model.objective_value(&point)?.unwrap(), 2.5, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_relu_network_with_propagated_big_m() -> anyhow::Result<()> {
    init_logger();
    let xlimits = array![[-2., 2.]];
    // |x| as relu(x) + relu(-x)
    let nn = NeuralNetwork::new(
        vec![array![[1.], [-1.]], array![[1., 1.]]],
        vec![array![0., 0.], array![0.]],
        Activation::Relu,
    )?;
    let scaling = ddobox::data::Scaling::<f64>::identity(1, 1);
    let params = FormulationParams::new()
        .big_m(BigM::propagated(xlimits.clone()))
        .check()?;
    let block = params.formulate(&Surrogate::from(nn), &scaling, false)?;
    let model = optimize_through(&block, &xlimits, 0, Sense::Maximize)?;
    assert_eq!(model.n_binaries(), 2);

    for x in [-1.5, 0.5] {
        let mut point = Assignment::zeros(model.n_vars());
        point.set(model.find("inputs[0]").unwrap(), x);
        point.set(model.find("surrogate.inputs[0]").unwrap(), x);
        for (n, w) in [1., -1.].iter().enumerate() {
            let z: f64 = w * x;
            point.set(model.find(&format!("surrogate.z[1,{n}]")).unwrap(), z);
            point.set(model.find(&format!("surrogate.a[1,{n}]")).unwrap(), z.max(0.));
            point.set(
                model.find(&format!("surrogate.y[1,{n}]")).unwrap(),
                if z > 0. { 1. } else { 0. },
            );
        }
        point.set(model.find("surrogate.z[2,0]").unwrap(), f64::abs(x));
        point.set(model.find("surrogate.outputs[0]").unwrap(), f64::abs(x));
        assert!(model.is_feasible(&point, 1e-9)?, "x = {x}");
        assert_eq!(model.objective_value(&point)?, Some(f64::abs(x)));
    }
    Ok(())
}

#[test]
fn test_geometric_active_learning() -> anyhow::Result<()> {
    init_logger();
    let xlimits = array![[0., 1.], [0., 1.]];
    let data = DataHandler::init_with_rng(
        6,
        &xlimits,
        1,
        SamplingKind::Lhs,
        Xoshiro256Plus::seed_from_u64(0),
    )?;
    let sampler = AdaptiveSampler::new(&xlimits)?;
    let mut x = data.x().to_owned();

    for _ in 0..3 {
        let part: Partition = partition(&x, &xlimits, true)?;
        assert_abs_diff_eq!(part.total_volume(), 1., epsilon = 1e-9);
        let largest = part
            .simplices()
            .iter()
            .map(|s| s.volume())
            .fold(0., f64::max);

        let model = sampler.max_volume(&part)?;
        let next = select(&model, 2)?;
        assert!(next.iter().all(|v| (0. ..=1.).contains(v)));
        let selected = part
            .simplices()
            .iter()
            .find(|s| (s.centroid() - &next).mapv(f64::abs).sum() < 1e-9)
            .ok_or_else(|| anyhow::anyhow!("selection is not a centroid"))?;
        assert_abs_diff_eq!(selected.volume(), largest, epsilon = 1e-12);

        x = concatenate![Axis(0), x, next.insert_axis(Axis(0))];
    }
    assert_eq!(x.nrows(), 9);

    // exploitation around the best sample
    let y = linear_response(&x).column(0).to_owned();
    let part = partition(&x, &xlimits, true)?;
    let model = sampler.exploit_adjacent(&part, &y, Sense::Minimize)?;
    let next = select(&model, 2)?;
    let best = y
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |b, (i, v)| if *v < b.1 { (i, *v) } else { b })
        .0;
    let best_point = part.point_of(best).unwrap();
    assert!(part
        .simplices_with(best_point)
        .iter()
        .any(|k| (part.simplices()[*k].centroid() - &next).mapv(f64::abs).sum() < 1e-9));
    Ok(())
}
