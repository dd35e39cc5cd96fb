// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
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

//! arcpoly-render entry point
//!
//! Renders a JSON scene through one pipeline instance and writes the final
//! front buffer as a binary PPM. Intended for inspecting hardware variant
//! configurations without a host emulator.

use arcpoly::core::config::{PipelineConfig, VariantPreset};
use arcpoly::core::pipeline::command::PolygonRecord;
use arcpoly::core::pipeline::Pipeline;
use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "arcpoly-render", version, about = "Render a polygon scene to a PPM image")]
struct Args {
    /// Scene file: a JSON list of polygon records, or an object with
    /// `textures`, `palette` and `records`
    scene: PathBuf,

    /// Pipeline configuration (TOML); falls back to ARCPOLY_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in preset used when no configuration file is given
    #[arg(short, long, default_value = "transform3d")]
    preset: String,

    /// Number of frames to render
    #[arg(short, long, default_value_t = 1)]
    frames: u32,

    /// Output image
    #[arg(short, long, default_value = "frame.ppm")]
    output: PathBuf,
}

/// Texel upload applied before the first frame
#[derive(Debug, Deserialize)]
struct TextureUpload {
    sheet: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    data: Vec<u16>,
}

#[derive(Debug, Deserialize)]
struct Scene {
    #[serde(default)]
    textures: Vec<TextureUpload>,
    #[serde(default)]
    palette: Vec<u32>,
    records: Vec<PolygonRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SceneFile {
    Records(Vec<PolygonRecord>),
    Full(Scene),
}

impl From<SceneFile> for Scene {
    fn from(file: SceneFile) -> Self {
        match file {
            SceneFile::Records(records) => Scene {
                textures: Vec::new(),
                palette: Vec::new(),
                records,
            },
            SceneFile::Full(scene) => scene,
        }
    }
}

fn load_config(args: &Args) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let path = args
        .config
        .clone()
        .or_else(|| std::env::var_os("ARCPOLY_CONFIG").map(PathBuf::from));

    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => {
            let preset: VariantPreset = args.preset.parse()?;
            log::info!("Using preset {:?}", preset);
            Ok(PipelineConfig::preset(preset))
        }
    }
}

fn write_ppm(path: &Path, width: usize, height: usize, pixels: &[u32]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{} {}\n255\n", width, height)?;
    for &argb in pixels {
        out.write_all(&[(argb >> 16) as u8, (argb >> 8) as u8, argb as u8])?;
    }
    out.flush()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let (width, height) = (config.width, config.height);

    let contents = std::fs::read_to_string(&args.scene)?;
    let scene: Scene = serde_json::from_str::<SceneFile>(&contents)?.into();
    log::info!(
        "Loaded {} records from {}",
        scene.records.len(),
        args.scene.display()
    );

    let mut pipeline = Pipeline::new(config)?;
    for upload in &scene.textures {
        pipeline.upload_texture(
            upload.sheet,
            upload.x,
            upload.y,
            upload.width,
            upload.height,
            &upload.data,
        )?;
    }
    for (index, &color) in scene.palette.iter().enumerate() {
        pipeline.set_palette(index, color)?;
    }

    for frame in 0..args.frames {
        pipeline.begin_frame();
        for record in &scene.records {
            if let Err(e) = pipeline.submit(record.clone()) {
                log::error!("Frame {}: {}", frame, e);
                break;
            }
        }
        match pipeline.end_frame() {
            Ok(changed) => log::info!("Frame {} done, display updated: {}", frame, changed),
            Err(e) => log::error!("Frame {}: {}", frame, e),
        }
    }

    let mut surface = vec![0xFF00_0000; width * height];
    pipeline.present(&mut surface, width)?;
    write_ppm(&args.output, width, height, &surface)?;
    log::info!("Wrote {}x{} image to {}", width, height, args.output.display());

    Ok(())
}
