//! Print the tensor-parallel shard plan of one GPTQ linear layer
//!
//! # Usage
//!
//! ```text
//! cargo run --example shard_plan -- -c /path/to/model/quant_config.json \
//!     --in-features 4096 --out-features 11008 --style column --world-size 2
//! ```
//!
//! Set `RUST_LOG=infernum_gptq=debug` to see the resolution trace. Pass
//! `--json` to emit the plan as JSON next to model metadata.

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use infernum_gptq::{
    column_partitionable, ignored, overlapping, plan_tensor_shard, row_partitionable,
    shard_strategy, GptqConfig, GptqTensor, ParallelStyle, Result, ShardConfig, ShardStrategy,
    TensorSet, TensorShard,
};

#[derive(Clone, Copy, ValueEnum)]
enum Style {
    Column,
    Row,
}

/// Print the shard plan of a GPTQ linear layer
#[derive(Parser)]
#[command(name = "shard_plan")]
struct Cli {
    /// Path to `quant_config.json`
    #[arg(short, long, env = "GPTQ_QUANT_CONFIG")]
    config: String,

    /// Input features of the layer
    #[arg(long)]
    in_features: usize,

    /// Output features of the layer
    #[arg(long)]
    out_features: usize,

    /// Parallel style of the layer
    #[arg(long, value_enum, default_value_t = Style::Column)]
    style: Style,

    /// Tensor-parallel world size
    #[arg(short, long, default_value_t = 2)]
    world_size: usize,

    /// Emit the plan as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct TensorPlan {
    tensor: GptqTensor,
    stored_shape: Vec<usize>,
    strategy: ShardStrategy,
    shards: Vec<Option<TensorShard>>,
}

#[derive(Serialize)]
struct LayerPlan {
    config: GptqConfig,
    row_partitionable: TensorSet,
    column_partitionable: TensorSet,
    ignored: TensorSet,
    world_size: usize,
    tensors: Vec<TensorPlan>,
}

fn layer_plan(cli: &Cli, config: GptqConfig, style: ParallelStyle) -> Result<LayerPlan> {
    let mut tensors = Vec::with_capacity(GptqTensor::ALL.len());
    for tensor in GptqTensor::ALL {
        let stored_shape = stored_shape(&config, tensor, cli.in_features, cli.out_features);
        let shards = (0..cli.world_size)
            .map(|rank| {
                let shard = ShardConfig {
                    rank,
                    world_size: cli.world_size,
                };
                plan_tensor_shard(&config, style, tensor.as_str(), &stored_shape, &shard)
            })
            .collect::<Result<Vec<_>>>()?;
        tensors.push(TensorPlan {
            tensor,
            stored_shape,
            strategy: shard_strategy(&config, style, tensor.as_str())?,
            shards,
        });
    }
    Ok(LayerPlan {
        config,
        row_partitionable: row_partitionable(&config),
        column_partitionable: column_partitionable(&config),
        ignored: ignored(&config),
        world_size: cli.world_size,
        tensors,
    })
}

/// Stored shape of each tensor in a GPTQ checkpoint.
fn stored_shape(
    config: &GptqConfig,
    tensor: GptqTensor,
    in_features: usize,
    out_features: usize,
) -> Vec<usize> {
    let pack = config.pack_factor() as usize;
    let num_groups = usize::try_from(config.group_size())
        .ok()
        .filter(|&g| g > 0)
        .map_or(1, |g| in_features / g);
    match tensor {
        GptqTensor::QWeight => vec![in_features / pack, out_features],
        GptqTensor::QZeros => vec![num_groups, out_features / pack],
        GptqTensor::Scales => vec![num_groups, out_features],
        GptqTensor::GIdx => vec![in_features],
        GptqTensor::Bias => vec![out_features],
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = GptqConfig::from_file(&cli.config)?;
    let style = match cli.style {
        Style::Column => ParallelStyle::Column,
        Style::Row => ParallelStyle::Row,
    };

    if cli.json {
        let plan = layer_plan(&cli, config, style)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{config}");
    println!("  row-partitionable:    {:?}", row_partitionable(&config));
    println!("  column-partitionable: {:?}", column_partitionable(&config));
    println!("  ignored:              {:?}", ignored(&config));
    let overlap = overlapping(&config);
    if !overlap.is_empty() {
        println!("  row/ignored overlap:  {overlap:?}");
    }
    println!();

    for rank in 0..cli.world_size {
        let shard = ShardConfig {
            rank,
            world_size: cli.world_size,
        };
        println!("rank {rank}:");
        for tensor in GptqTensor::ALL {
            let shape = stored_shape(&config, tensor, cli.in_features, cli.out_features);
            let bytes = shape.iter().product::<usize>() * tensor.storage_dtype().size_in_bytes();
            match plan_tensor_shard(&config, style, tensor.as_str(), &shape, &shard)? {
                Some(s) => println!(
                    "  {tensor:<8} {shape:?} ({bytes} B) -> axis {} [{}, {})",
                    s.axis,
                    s.start,
                    s.start + s.len
                ),
                None => println!("  {tensor:<8} {shape:?} ({bytes} B) -> replicated"),
            }
        }
    }
    Ok(())
}
