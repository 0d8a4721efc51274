// Copyright 2024 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mnist_inference::{
    DisplayActivations, Inference, InferenceCache, LayerConfig, Network, ParameterBundle, Tensor2,
    Tensor4,
};
use serde::{Deserialize, Serialize};

mod sample {
    // Include a sample digit for testing
    include!("input/sample_input.rs");
}

/// Arguments for the digit classifier
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Classify the built-in sample digit.
    #[clap(long)]
    sample: bool,
    /// Path to an image file (rows * cols pixel values). May be repeated.
    #[clap(long = "image-file")]
    image_files: Vec<PathBuf>,
    /// Trained parameters with fields W1, b1, W2, b2, W3, b3: JSON, or bincode when the
    /// file ends in `.bin`.
    #[clap(short, long, env)]
    params_file: PathBuf,
    /// Every pixel is divided by this before inference (255 for raw byte images).
    #[clap(long, env, default_value_t = 1.0)]
    pixel_scale: f64,
    /// Print results as JSON on stdout instead of logging them.
    #[clap(long)]
    json: bool,
    /// Include display-scaled activations for each image in the JSON output. Traced
    /// images run the full forward pass every time and bypass the result cache.
    #[clap(long, requires = "json")]
    trace: bool,
    /// Layer sizes of the network the parameters were trained for.
    #[clap(flatten, next_help_heading = "Network Layout")]
    layers: LayerConfig,
}

#[derive(Debug, Serialize)]
struct Report {
    source: String,
    #[serde(flatten)]
    inference: Inference,
    #[serde(skip_serializing_if = "Option::is_none")]
    activations: Option<DisplayActivations>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }
    let args = Args::parse();

    if !args.pixel_scale.is_finite() || args.pixel_scale <= 0.0 {
        bail!("--pixel-scale must be a positive number, got {}", args.pixel_scale);
    }

    // Get the input data
    let mut inputs: Vec<(String, Vec<f64>)> = Vec::new();
    if args.sample {
        tracing::info!("Using sample digit image...");
        inputs.push(("sample".to_string(), sample::SAMPLE.to_vec()));
    }
    for path in &args.image_files {
        tracing::info!("Loading image from: {}", path.display());
        let pixels = load_image_from_file(path)?;
        inputs.push((path.display().to_string(), pixels));
    }
    if inputs.is_empty() {
        bail!("Must specify either --sample or at least one --image-file");
    }

    let network = Network::new(args.layers).context("invalid network layout")?;
    let input_shape = network.config().input_shape();
    let pixels_per_image: usize = input_shape.iter().product();

    let bundle = load_params(&args.params_file)?;
    let fingerprint = network
        .load(bundle)
        .context("parameter bundle does not match the network layout")?;
    tracing::info!(
        "Loaded parameters {} from {}",
        fingerprint,
        args.params_file.display()
    );

    let mut cache = InferenceCache::new();
    let mut reports = Vec::with_capacity(inputs.len());
    for (source, pixels) in inputs {
        // Ensure we have exactly one full image
        if pixels.len() != pixels_per_image {
            bail!(
                "{}: image must contain exactly {} pixel values ({}x{}x{}), found {}",
                source,
                pixels_per_image,
                input_shape[1],
                input_shape[2],
                input_shape[3],
                pixels.len()
            );
        }
        let pixels = pixels.into_iter().map(|v| v / args.pixel_scale).collect();
        let image = Tensor4::from_vec(input_shape, pixels)?;

        let (inference, activations) = classify(&network, &mut cache, &image, args.trace)
            .with_context(|| format!("inference failed for {}", source))?;

        if args.json {
            reports.push(Report {
                source,
                inference: Inference::clone(&inference),
                activations,
            });
        } else {
            tracing::info!("{}: class scores:", source);
            for (digit, (score, probability)) in inference
                .scores
                .iter()
                .zip(&inference.probabilities)
                .enumerate()
            {
                tracing::info!("  Digit {}: {:>10.4} (p = {:.6})", digit, score, probability);
            }
            tracing::info!(
                "{}: predicted digit {} with probability {:.6}",
                source,
                inference.predicted,
                inference.confidence()
            );
        }
    }

    let (hits, misses) = cache.stats();
    tracing::debug!("Inference cache: {} hits, {} misses", hits, misses);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    Ok(())
}

/// Runs one image. A traced run already computes the scores, so it takes them
/// from the trace instead of going through the cache.
fn classify(
    network: &Network,
    cache: &mut InferenceCache,
    image: &Tensor4,
    trace: bool,
) -> mnist_inference::Result<(Arc<Inference>, Option<DisplayActivations>)> {
    if trace {
        let trace = network.trace(image)?;
        Ok((Arc::new(trace.inference()), Some(trace.display())))
    } else {
        Ok((cache.get_or_infer(network, image)?, None))
    }
}

fn load_params(path: &Path) -> Result<ParameterBundle> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read parameter file {}", path.display()))?;

    let bundle = if path.extension().is_some_and(|ext| ext == "bin") {
        tracing::debug!("Decoding bincode parameter bundle");
        ParameterBundle::from_bincode(&bytes)?
    } else {
        tracing::debug!("Decoding JSON parameter bundle");
        ParameterBundle::from_json(&bytes)?
    };
    Ok(bundle)
}

fn load_image_from_file(path: &Path) -> Result<Vec<f64>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read image file {}", path.display()))?;
    parse_image(&contents)
}

/// JSON image: one flat array, or rows of pixels.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonImage {
    Flat(Vec<f64>),
    Rows(Vec<Vec<f64>>),
}

fn parse_image(contents: &str) -> Result<Vec<f64>> {
    // Parse the file content - support different formats
    let input_data: Vec<f64> = if contents.contains("pub const") && contents.contains("[f64;") {
        // Rust array format - extract the array part
        tracing::info!("Parsing Rust array format file");

        let start = contents
            .find("= [")
            .context("No array start '= [' found in Rust file")?
            + 3; // Skip "= ["

        let end = contents
            .rfind("];")
            .context("No array end '];' found in Rust file")?;

        let array_content = &contents[start..end];

        // Parse comma-separated values, handling whitespace and empty entries
        array_content
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(
                        trimmed
                            .parse::<f64>()
                            .with_context(|| format!("Failed to parse number: '{}'", trimmed)),
                    )
                }
            })
            .collect::<Result<Vec<_>, _>>()?
    } else if contents.trim().starts_with('[') {
        // JSON array format
        match serde_json::from_str(contents).context("invalid JSON image")? {
            JsonImage::Flat(pixels) => pixels,
            JsonImage::Rows(rows) => Tensor2::from_nested(rows)?.into_vec(),
        }
    } else if contents.contains(',') {
        // Comma-separated values
        contents
            .split(',')
            .map(|s| s.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?
    } else {
        // Space-separated values
        contents
            .split_whitespace()
            .map(|s| s.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(input_data)
}
