use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::Antialiasing;

#[derive(Parser, Debug)]
#[command(
    name = "driftfield",
    author,
    version,
    about = "Procedural background effect preview",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Spin-gradient field.
    Vortex(EffectArgs),
    /// Light-beam field.
    Beams(EffectArgs),
    /// Pointer-driven fluid field.
    Ether(EffectArgs),
    /// List available presets.
    ListPresets {
        /// Preset TOML file; bundled presets when omitted.
        #[arg(long, value_name = "PATH")]
        presets: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct EffectArgs {
    /// Named preset to start from.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Override one parameter with TOML syntax, e.g. `--set 'spin_speed = 2.0'`
    /// or `--set 'color1 = "#DE443B"'`. May be repeated; overrides beat the
    /// preset, which beats the defaults.
    #[arg(long = "set", value_name = "KEY = VALUE")]
    pub set: Vec<String>,

    /// Preset TOML file; bundled presets when omitted.
    #[arg(long, value_name = "PATH")]
    pub presets: Option<PathBuf>,

    /// Window size in physical pixels.
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_size,
        default_value = "1280x720"
    )]
    pub size: (u32, u32),

    /// FPS cap (0 = uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an MSAA sample count.
    #[arg(
        long,
        value_name = "MODE",
        value_parser = parse_antialias_flag,
        default_value = "auto"
    )]
    pub antialias: Antialiasing,

    /// Evaluate the effect at a fixed timestamp instead of animating.
    #[arg(long, value_name = "SECONDS")]
    pub still: Option<f32>,

    /// Render one frame (at `--still`, default 0) to PATH as PNG, then exit.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{value}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{value}'"))?;
    if width == 0 || height == 0 {
        return Err("size dimensions must be non-zero".to_owned());
    }
    Ok((width, height))
}

fn parse_antialias_flag(value: &str) -> Result<Antialiasing, String> {
    renderer::parse_antialias(value).map_err(|err| err.to_string())
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_flag_parses_dimensions() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size("800X600").unwrap(), (800, 600));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x600").is_err());
    }

    #[test]
    fn cli_parses_effect_subcommands() {
        let cli = Cli::try_parse_from([
            "driftfield",
            "ether",
            "--preset",
            "backdrop",
            "--set",
            "mouse_force = 12.0",
            "--size",
            "640x480",
        ])
        .unwrap();
        match cli.command {
            Command::Ether(args) => {
                assert_eq!(args.preset.as_deref(), Some("backdrop"));
                assert_eq!(args.set.len(), 1);
                assert_eq!(args.size, (640, 480));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
