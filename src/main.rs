//! Demo driver for the Net2Net transformations.
//!
//! Recreates the shapes of the original MNIST experiment (conv1 with 32
//! 5x5 filters feeding conv2 with 64) using random "teacher"
//! parameters, widens conv1, inserts an identity layer after it, and checks
//! on sample data that both students still compute the teacher's function.
//! Actual training of teacher and students belongs to a host framework.

use clap::Parser;
use ndarray::{Array, Array1, ArrayD};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use net2net::model::ModelParams;
use net2net::transform::{deepen, widen, DeepenConfig, WidenConfig};
use net2net::verify;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "net2net: function-preserving widen/deepen demo", long_about = None)]
struct Args {
    /// Target width for the widened layer
    #[arg(long, default_value_t = 128)]
    new_width: usize,

    /// Perturb the new capacity to break symmetry between replicated units
    #[arg(long)]
    noise: bool,

    /// Seed for reproducible transformations (and for the random teacher)
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// JSON config file overriding the flags above
    #[arg(long)]
    config: Option<PathBuf>,
}

/// The recognized configuration surface, as a JSON file:
/// `{"target_layer": "conv1", "next_layer": "conv2", "new_width": 128, "add_noise": false}`
#[derive(Debug, Deserialize)]
struct DemoConfig {
    target_layer: String,
    next_layer: String,
    new_width: usize,
    #[serde(default)]
    add_noise: bool,
    #[serde(default)]
    seed: Option<u64>,
}

impl DemoConfig {
    fn from_args(args: &Args) -> Self {
        Self {
            target_layer: "conv1".to_string(),
            next_layer: "conv2".to_string(),
            new_width: args.new_width,
            add_noise: args.noise,
            seed: Some(args.seed),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let cfg: DemoConfig = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => DemoConfig::from_args(&args),
    };

    // Random stand-in for a trained teacher, in the original experiment's
    // architecture (reduced spatial extent; the transforms never see it).
    let mut rng = StdRng::seed_from_u64(cfg.seed.unwrap_or(0));
    let dist = Uniform::new(-0.5f32, 0.5);
    let mut model = ModelParams::new();
    model.insert_layer(
        &cfg.target_layer,
        Array::random_using((5, 5, 1, 32), dist, &mut rng).into_dyn(),
        Array1::random_using(32, dist, &mut rng).into_dyn(),
    );
    model.insert_layer(
        &cfg.next_layer,
        Array::random_using((5, 5, 32, 64), dist, &mut rng).into_dyn(),
        Array1::random_using(64, dist, &mut rng).into_dyn(),
    );
    let input: ArrayD<f32> = Array::random_using((2, 12, 12, 1), dist, &mut rng).into_dyn();

    let (w1, b1) = model.weight_bias(&cfg.target_layer)?;
    let (w2, b2) = model.weight_bias(&cfg.next_layer)?;
    let (w1, b1, w2, b2) = (w1.clone(), b1.clone(), w2.clone(), b2.clone());

    // Net2Wider.
    let widen_cfg = WidenConfig {
        new_width: cfg.new_width,
        add_noise: cfg.add_noise,
        seed: cfg.seed,
    };
    let widened = widen(&w1, &b1, &w2, &widen_cfg)?;
    let deviation =
        verify::widen_preserves(&w1, &b1, &w2, &b2, &widened, &input, f32::INFINITY)?;
    let old_width = net2net::LayerKind::of(&w1)?.width(&w1);
    println!(
        "[WIDER] '{}' widened {} -> {} units; max output deviation {:.3e}",
        cfg.target_layer, old_width, cfg.new_width, deviation
    );

    // Net2Deeper.
    let deepen_cfg = DeepenConfig {
        add_noise: cfg.add_noise,
        seed: cfg.seed,
    };
    let deepened = deepen(&w1, &deepen_cfg)?;
    let activation = verify::relu(&verify::conv2d_same_forward(&input, &w1, &b1)?);
    let deviation = verify::deepen_preserves(&deepened, &activation, f32::INFINITY)?;
    println!(
        "[DEEPER] identity layer {:?} inserted after '{}'; max deviation {:.3e}",
        deepened.weight.shape(),
        cfg.target_layer,
        deviation
    );

    // The same transformations, driven by layer name through the store.
    model.net2wider(&cfg.target_layer, &cfg.next_layer, &widen_cfg)?;
    model.net2deeper(
        &cfg.target_layer,
        &format!("{}_new", cfg.target_layer),
        &deepen_cfg,
    )?;
    println!(
        "[MODEL] {} parameter tensors ready for the student graph",
        model.len()
    );

    Ok(())
}
