use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "bench_functions_lambda";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the benchmark functions workspace",
    long_about = "Packages the k-means and join functions as Lambda artifacts,\n\
                  runs them locally and runs the CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one function once with the direct-invocation request (size small)
    Invoke {
        #[arg(value_enum)]
        function: BenchFunction,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Debug)]
        profile: BuildProfile,
    },
    /// Run CI checks
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build both functions and package them as Lambda zip artifacts
    Package {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory receiving one zip per function
        #[arg(long, env = "BENCH_DIST_DIR", default_value = "dist")]
        dist_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BenchFunction {
    Kmeans,
    Join,
}

impl BenchFunction {
    const ALL: [Self; 2] = [Self::Kmeans, Self::Join];

    fn bin_name(self) -> &'static str {
        match self {
            Self::Kmeans => "kmeans_function",
            Self::Join => "join_function",
        }
    }

    fn archive_name(self) -> String {
        format!("{}.zip", self.bin_name())
    }
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Tests only
    Test,
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

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    exit(1);
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .unwrap_or_else(|error| fail(format!("failed to execute cargo: {error}")))
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn with_profile<'a>(mut args: Vec<&'a str>, profile: BuildProfile) -> Vec<&'a str> {
    if let Some(flag) = profile.as_cargo_flag() {
        args.push(flag);
    }
    args
}

// ── commands ───────────────────────────────────────────────────────

fn invoke_function(function: BenchFunction, profile: BuildProfile) {
    step(&format!("Invoke {} directly", function.bin_name()));
    let args = with_profile(
        vec!["run", "-p", LAMBDA_PACKAGE, "--bin", function.bin_name()],
        profile,
    );
    run_cargo(&args);
}

fn package_functions(target: &str, profile: BuildProfile, dist_dir: &Path) {
    ensure_rust_target_installed(target);

    step("Build function binaries");
    let mut args = vec!["build", "-p", LAMBDA_PACKAGE, "--target", target];
    for function in BenchFunction::ALL {
        args.extend(["--bin", function.bin_name()]);
    }
    run_cargo(&with_profile(args, profile));

    step("Package Lambda zip artifacts");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    fs::create_dir_all(dist_dir).unwrap_or_else(|error| {
        fail(format!(
            "failed to create dist directory '{}': {error}",
            dist_dir.display()
        ))
    });

    let mut packaged = Vec::with_capacity(BenchFunction::ALL.len());
    for function in BenchFunction::ALL {
        let zip_path = dist_dir.join(function.archive_name());
        package_lambda_zip(
            &target_dir.join(binary_name(function.bin_name(), target)),
            &zip_path,
        );
        packaged.push(zip_path);
    }

    eprintln!("\nPackaged artifacts:");
    for path in packaged {
        eprintln!("- {}", path.display());
    }
}

fn ensure_rust_target_installed(target: &str) {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    let installed = String::from_utf8_lossy(&output.stdout);
    if output.status.success() && !installed.lines().any(|line| line.trim() == target) {
        fail(format!(
            "rust target `{target}` is not installed; run `rustup target add {target}` and retry"
        ));
    }
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// Lambda custom runtimes start the archive entry named `bootstrap`.
fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    let binary = fs::read(binary_path).unwrap_or_else(|error| {
        fail(format!(
            "expected lambda binary at '{}': {error}",
            binary_path.display()
        ))
    });

    if let Err(error) = write_bootstrap_zip(&binary, zip_path) {
        fail(format!("failed to write '{}': {error}", zip_path.display()));
    }
}

fn write_bootstrap_zip(binary: &[u8], zip_path: &Path) -> zip::result::ZipResult<()> {
    let mut zip = ZipWriter::new(fs::File::create(zip_path)?);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)?;
    zip.write_all(binary)?;
    zip.finish()?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_test() {
    step("Test bench_functions_core");
    run_cargo(&["test", "-p", "bench_functions_core"]);

    step("Test bench_functions_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    ci_test();
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Invoke { function, profile } => invoke_function(function, profile),
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Test => ci_test(),
            }
            eprintln!("\nCI job passed.");
        }
        Commands::Package {
            target,
            profile,
            dist_dir,
        } => package_functions(&target, profile, &dist_dir),
    }
}
