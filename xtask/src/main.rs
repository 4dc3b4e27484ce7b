use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const ACTION_PACKAGE: &str = "workspace_backup_action";
const ACTION_BINARY: &str = "backup_action";
const DIST_DIR: &str = "dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the workspace backup action",
    long_about = "Runs CI checks and packages the backup action binary\n\
                  for distribution alongside the action definition."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the action binary and zip it into dist/
    Package {
        /// Compilation target triple for the runner
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting only
    Fmt,
    /// Clippy with warnings denied
    Clippy,
    /// Workspace tests
    Test,
    /// Formatting, clippy, and tests
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn run_cargo(args: &[&str]) -> Result<(), String> {
    eprintln!("+ cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .map_err(|error| format!("failed to execute cargo: {error}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!(
            "cargo {} exited with {}",
            args.join(" "),
            status.code().map_or("signal".to_string(), |code| code.to_string())
        ))
    }
}

fn ensure_rust_target_installed(target: &str) -> Result<(), String> {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return Ok(());
        }
    };

    if !output.status.success() {
        return Err(format!(
            "failed to list installed rust targets: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if installed.lines().any(|line| line.trim() == target) {
        Ok(())
    } else {
        Err(format!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        ))
    }
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

fn artifact_path(target: &str) -> PathBuf {
    Path::new(DIST_DIR).join(format!("{ACTION_BINARY}-{target}.zip"))
}

fn package_action(target: &str, profile: BuildProfile) -> Result<PathBuf, String> {
    ensure_rust_target_installed(target)?;

    step("Build action binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        ACTION_PACKAGE,
        "--target",
        target,
        "--bin",
        ACTION_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args)?;

    step("Package action artifact");
    let binary = binary_name(ACTION_BINARY, target);
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(&binary);
    fs::create_dir_all(DIST_DIR)
        .map_err(|error| format!("failed to create {DIST_DIR}: {error}"))?;

    let zip_path = artifact_path(target);
    write_zip(&binary_path, &binary, &zip_path)?;
    Ok(zip_path)
}

fn write_zip(binary_path: &Path, entry_name: &str, zip_path: &Path) -> Result<(), String> {
    let binary = fs::read(binary_path)
        .map_err(|error| format!("failed to read '{}': {error}", binary_path.display()))?;
    let file = fs::File::create(zip_path)
        .map_err(|error| format!("failed to create '{}': {error}", zip_path.display()))?;

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file(entry_name, options)
        .map_err(|error| format!("failed to start zip entry: {error}"))?;
    zip.write_all(&binary)
        .map_err(|error| format!("failed to write zip entry: {error}"))?;
    zip.finish()
        .map_err(|error| format!("failed to finish zip: {error}"))?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_fmt() -> Result<(), String> {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"])
}

fn ci_clippy() -> Result<(), String> {
    step("Clippy");
    run_cargo(&[
        "clippy",
        "--workspace",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ])
}

fn ci_test() -> Result<(), String> {
    step("Test workspace_backup_core");
    run_cargo(&["test", "-p", "workspace_backup_core"])?;

    step("Test workspace_backup_action");
    run_cargo(&["test", "-p", ACTION_PACKAGE])
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ci { job } => {
            let outcome = match job {
                CiJob::Fmt => ci_fmt(),
                CiJob::Clippy => ci_clippy(),
                CiJob::Test => ci_test(),
                CiJob::Check => ci_fmt().and_then(|_| ci_clippy()).and_then(|_| ci_test()),
            };
            outcome.map(|_| eprintln!("\nCI job passed."))
        }
        Commands::Package { target, profile } => package_action(&target, profile)
            .map(|path| eprintln!("\nPackaged artifact:\n- {}", path.display())),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        exit(1);
    }
}
