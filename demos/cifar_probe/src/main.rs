use anyhow::{anyhow, bail};
use burn::backend::NdArray;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::Tensor;
use clap::Parser;
use resnet_cifar::models::family::CifarModelConfig;
use resnet_cifar::models::residual::stage::StageMeta;
use resnet_cifar::prefabs::{all_prefabs, lookup_prefab};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Name of a registered prefab, e.g. `resnet_preact-20` or `wrn-28-10`.
    #[arg(long, conflicts_with = "config")]
    prefab: Option<String>,

    /// Path to a JSON `CifarModelConfig`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the selected config as JSON to this path.
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// List the registered prefabs and exit.
    #[arg(long, default_value_t = false)]
    list: bool,

    /// Batch size of the zero input.
    #[arg(long, default_value = "2")]
    batch_size: usize,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    if args.list {
        for prefab in all_prefabs() {
            println!("{:<20} {}", prefab.name, prefab.description);
        }
        return Ok(());
    }

    let config: CifarModelConfig = match (&args.prefab, &args.config) {
        (Some(name), None) => lookup_prefab(name)?.new_config(),
        (None, Some(path)) => CifarModelConfig::load(path)
            .map_err(|err| anyhow!("loading {}: {err}", path.display()))?,
        _ => bail!("exactly one of --prefab or --config is required"),
    };

    if let Some(path) = &args.save_config {
        config.save(path)?;
        info!(path = %path.display(), "saved config");
    }

    type B = NdArray<f32>;
    let device = Default::default();

    let structure = config.to_structure()?;
    let network = structure.try_init::<B>(&device)?;

    let input = Tensor::<B, 4>::zeros(
        [
            args.batch_size,
            structure.in_channels,
            structure.image_size,
            structure.image_size,
        ],
        &device,
    );
    let output = network.forward(input);

    println!("family:        {}", config.family());
    for (idx, stage) in structure.stages.iter().enumerate() {
        println!(
            "stage {}:       {} blocks, {} -> {} planes, stride {}",
            idx + 1,
            stage.len(),
            stage.in_planes(),
            stage.out_planes(),
            stage.stride()
        );
    }
    println!("feature size:  {}", network.feature_size());
    println!("parameters:    {}", network.num_params());
    println!("output shape:  {:?}", output.dims());

    Ok(())
}
