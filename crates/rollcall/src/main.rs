use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rollcall_core::{CosineThreshold, OnnxFaceEngine};
use rollcall_hw::Camera;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod attendance;
mod config;
mod display;
mod enrollment;
mod index;
mod prompt;
mod roster;
mod session;
#[cfg(test)]
mod testing;

use attendance::AttendanceLog;
use config::Config;
use display::{Headless, PreviewWindow, Viewer};
use index::EncodingIndex;
use prompt::{ConsoleInput, InputProvider};
use roster::Roster;
use session::Session;

#[derive(Parser)]
#[command(name = "rollcall", about = "Webcam face recognition attendance register")]
struct Cli {
    /// TOML config file; ROLLCALL_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognise faces from the webcam and mark attendance (default)
    Run(RunArgs),
    /// Capture reference images for a new person
    Enroll {
        /// Display name; saved images are named {NAME}_{n}.jpg
        name: String,
        /// Folder of reference images
        #[arg(short, long)]
        folder: PathBuf,
    },
    /// Encode a reference folder and print the enrolled names as JSON
    Index {
        #[arg(short, long)]
        folder: PathBuf,
    },
    /// Print an attendance table as JSON
    Log {
        #[arg(short, long)]
        table: PathBuf,
    },
    /// List V4L2 capture devices
    Devices,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Folder of reference images
    #[arg(short, long)]
    folder: Option<PathBuf>,
    /// Attendance table (.xlsx)
    #[arg(short, long)]
    table: Option<PathBuf>,
    /// Roster file of `identifier,name` lines
    #[arg(short, long)]
    roster: Option<PathBuf>,
    /// Register this person before recognition starts
    #[arg(long, value_name = "NAME", conflicts_with = "no_register")]
    register: Option<String>,
    /// Skip the registration question
    #[arg(long)]
    no_register: bool,
    /// Run without a preview window
    #[arg(long)]
    headless: bool,
    /// Stop after this many frames
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let mut input = ConsoleInput;
    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(&config, args, &mut input),
        Commands::Enroll { name, folder } => {
            let (mut camera, mut engine) = open_capture(&config)?;
            let saved = enrollment::register_person(
                &name,
                &folder,
                &mut camera,
                &mut engine,
                &mut input,
                config.enroll_captures,
            )?;
            println!("Saved {} image(s) for {name}.", saved.len());
            Ok(())
        }
        Commands::Index { folder } => {
            let mut engine = load_engine(&config)?;
            let index = EncodingIndex::build(&folder, &mut engine)?;
            println!("{}", serde_json::to_string_pretty(index.names())?);
            Ok(())
        }
        Commands::Log { table } => {
            let records = AttendanceLog::new(table).read_all()?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
            Ok(())
        }
    }
}

/// The interactive workflow: gather paths, optionally register someone, build
/// the index and run recognition until the operator stops it.
fn run(config: &Config, args: RunArgs, input: &mut dyn InputProvider) -> Result<()> {
    let folder = path_or_ask(args.folder, input, "Enter the folder path for images: ")?;
    let table = path_or_ask(args.table, input, "Enter the attendance table path (.xlsx): ")?;
    let roster_path = path_or_ask(args.roster, input, "Enter the roster file path: ")?;
    let register = registration_name(args.register, args.no_register, input)?;

    let roster = Roster::load(&roster_path)?;
    if roster.is_empty() {
        tracing::warn!("roster is empty, every attendance row will use N/A");
    }

    let (mut camera, mut engine) = open_capture(config)?;

    if let Some(name) = register {
        enrollment::register_person(
            &name,
            &folder,
            &mut camera,
            &mut engine,
            input,
            config.enroll_captures,
        )?;
    }

    let index = EncodingIndex::build(&folder, &mut engine)?;
    if index.is_empty() {
        tracing::warn!(
            folder = %folder.display(),
            "no enrolled faces, everyone will show as Unknown"
        );
    }

    let mut viewer: Box<dyn Viewer> = if args.headless {
        Box::new(Headless::new(args.max_frames))
    } else {
        Box::new(PreviewWindow::open(
            "rollcall",
            camera.width,
            camera.height,
            config.font_path.as_deref(),
            args.max_frames,
        )?)
    };

    let mut session = Session::new(
        roster,
        index,
        Box::new(CosineThreshold::new(config.match_threshold)),
        AttendanceLog::new(table),
    );
    let summary = session.run(&mut camera, &mut engine, viewer.as_mut())?;
    tracing::info!(
        frames = summary.frames,
        faces = summary.faces,
        marked = ?summary.marked,
        "session finished"
    );
    Ok(())
}

fn open_capture(config: &Config) -> Result<(Camera, OnnxFaceEngine)> {
    let mut camera = Camera::open(&config.camera_device, config.frame_width, config.frame_height)
        .with_context(|| format!("failed to open camera {}", config.camera_device))?;
    let engine = load_engine(config)?;
    camera.warm_up(config.warmup_frames);
    Ok((camera, engine))
}

fn load_engine(config: &Config) -> Result<OnnxFaceEngine> {
    OnnxFaceEngine::load(&config.model_dir)
        .with_context(|| format!("failed to load face models from {}", config.model_dir.display()))
}

fn path_or_ask(
    given: Option<PathBuf>,
    input: &mut dyn InputProvider,
    prompt: &str,
) -> Result<PathBuf> {
    if let Some(path) = given {
        return Ok(path);
    }
    let answer = input.ask(prompt)?;
    Ok(Path::new(answer.trim()).to_path_buf())
}

/// `Some(name)` if a person should be registered before recognition.
fn registration_name(
    given: Option<String>,
    skip: bool,
    input: &mut dyn InputProvider,
) -> Result<Option<String>> {
    if given.is_some() || skip {
        return Ok(given);
    }
    if !input.confirm("Do you want to register a new person? (y/n): ")? {
        return Ok(None);
    }
    let name = input.ask("Enter the name of the person: ")?;
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "a name is required to register a person");
    Ok(Some(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInput;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["rollcall"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_register_conflicts_with_no_register() {
        let args = ["rollcall", "run", "--register", "Alice", "--no-register"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_max_frames_must_be_positive() {
        assert!(Cli::try_parse_from(["rollcall", "run", "--max-frames", "0"]).is_err());

        let args = ["rollcall", "run", "--headless", "--max-frames", "1"];
        let cli = Cli::try_parse_from(args).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected the run subcommand");
        };
        assert_eq!(args.max_frames, Some(1));
        assert!(args.headless);
    }

    #[test]
    fn test_given_path_skips_prompt() {
        let mut input = ScriptedInput::new(Vec::<String>::new());
        let path = path_or_ask(Some(PathBuf::from("/faces")), &mut input, "Folder: ").unwrap();
        assert_eq!(path, PathBuf::from("/faces"));
        assert!(input.prompts.is_empty());
    }

    #[test]
    fn test_missing_path_is_prompted() {
        let mut input = ScriptedInput::new(["  /data/faces  "]);
        let path = path_or_ask(None, &mut input, "Folder: ").unwrap();
        assert_eq!(path, PathBuf::from("/data/faces"));
        assert_eq!(input.prompts, vec!["Folder: ".to_string()]);
    }

    #[test]
    fn test_registration_prompts() {
        let mut input = ScriptedInput::new(["y", " Alice "]);
        let name = registration_name(None, false, &mut input).unwrap();
        assert_eq!(name.as_deref(), Some("Alice"));

        let mut input = ScriptedInput::new(["n"]);
        assert_eq!(registration_name(None, false, &mut input).unwrap(), None);

        let mut input = ScriptedInput::new(Vec::<String>::new());
        assert_eq!(registration_name(None, true, &mut input).unwrap(), None);
        assert_eq!(
            registration_name(Some("Bob".into()), false, &mut input).unwrap().as_deref(),
            Some("Bob")
        );
        assert!(input.prompts.is_empty());
    }

    #[test]
    fn test_registration_only_on_plain_y() {
        let mut input = ScriptedInput::new(["yes"]);
        assert_eq!(registration_name(None, false, &mut input).unwrap(), None);
        assert_eq!(input.prompts.len(), 1);
    }

    #[test]
    fn test_registration_requires_name() {
        let mut input = ScriptedInput::new(["y", "   "]);
        assert!(registration_name(None, false, &mut input).is_err());
    }
}
