//! The `build` command: run the orchestrator over a source tree.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ori_build::{
    BuildConfig, BuildError, BuildMode, BuildReport, CommandEngine, Orchestrator, ProgressSink,
};
use ori_diagnostic::emitter::{ColorMode, DiagnosticEmitter, JsonEmitter, TerminalEmitter};

/// Environment variable naming the compile engine command when `--engine=`
/// is not given.
pub const ENGINE_ENV: &str = "ORI_ENGINE";

const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(500);

/// How build reports are printed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

/// Options of `ori build`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildArgs {
    /// Source root (default: current directory).
    pub path: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub static_compile: bool,
    /// Typed-source extensions; empty keeps the default.
    pub extensions: Vec<String>,
    /// Compile engine command line.
    pub engine: Option<String>,
    pub rebuild: bool,
    /// Poll interval in watch mode.
    pub watch: Option<Duration>,
    pub format: OutputFormat,
    pub verbose: bool,
}

impl Default for BuildArgs {
    fn default() -> Self {
        BuildArgs {
            path: PathBuf::from("."),
            output_dir: None,
            static_compile: false,
            extensions: Vec::new(),
            engine: None,
            rebuild: false,
            watch: None,
            format: OutputFormat::Terminal,
            verbose: false,
        }
    }
}

impl BuildArgs {
    pub fn config(&self) -> BuildConfig {
        let mut config = BuildConfig::new(&self.path).with_static_compile(self.static_compile);
        if let Some(out) = &self.output_dir {
            config = config.with_output_dir(out);
        }
        if !self.extensions.is_empty() {
            config = config.with_source_extensions(self.extensions.iter().cloned());
        }
        config
    }

    /// The engine command: `--engine=` first, then [`ENGINE_ENV`].
    pub fn engine_command(&self) -> Option<String> {
        self.engine
            .clone()
            .or_else(|| std::env::var(ENGINE_ENV).ok())
            .filter(|command| !command.trim().is_empty())
    }

    fn mode(&self) -> BuildMode {
        if self.rebuild {
            BuildMode::Rebuild
        } else {
            BuildMode::Auto
        }
    }
}

/// Parse the arguments following `ori build`.
pub fn parse_build_args(args: &[String]) -> BuildArgs {
    let mut parsed = BuildArgs::default();
    let mut path = None;

    for arg in args {
        if let Some(dir) = arg.strip_prefix("--out=") {
            parsed.output_dir = Some(PathBuf::from(dir));
        } else if arg == "--static" {
            parsed.static_compile = true;
        } else if let Some(list) = arg.strip_prefix("--ext=") {
            parsed.extensions.extend(
                list.split(',')
                    .map(str::trim)
                    .filter(|ext| !ext.is_empty())
                    .map(ToString::to_string),
            );
        } else if let Some(command) = arg.strip_prefix("--engine=") {
            parsed.engine = Some(command.to_string());
        } else if arg == "--rebuild" {
            parsed.rebuild = true;
        } else if arg == "--watch" {
            parsed.watch = Some(DEFAULT_WATCH_INTERVAL);
        } else if let Some(ms) = arg.strip_prefix("--watch=") {
            if let Ok(ms) = ms.parse::<u64>() {
                parsed.watch = Some(Duration::from_millis(ms.max(1)));
            } else {
                eprintln!("warning: invalid watch interval '{ms}', using 500ms");
                parsed.watch = Some(DEFAULT_WATCH_INTERVAL);
            }
        } else if arg == "--json" {
            parsed.format = OutputFormat::Json;
        } else if arg == "--verbose" || arg == "-v" {
            parsed.verbose = true;
        } else if arg.starts_with('-') {
            eprintln!("warning: unknown build option '{arg}'");
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else {
            eprintln!("warning: ignoring extra path '{arg}'");
        }
    }

    if let Some(path) = path {
        parsed.path = path;
    }
    parsed
}

/// Progress printed to stderr, one line per compiled unit.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl ProgressSink for ConsoleProgress {
    fn set_total(&self, total: usize) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn advance(&self, label: &str) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        eprintln!("   Compiled {label} ({done}/{total})");
    }
}

/// Write every diagnostic of `report`, then its summary.
pub fn render_report(report: &BuildReport, emitter: &mut dyn DiagnosticEmitter) {
    for diagnostic in report.diagnostics() {
        emitter.emit(diagnostic);
    }
    if let Some(summary) = report.summary() {
        emitter.emit_summary(
            summary.kind.severity(),
            &summary.message,
            report.error_count,
            report.warning_count,
        );
    }
    emitter.flush();
}

fn print_report(report: &BuildReport, format: OutputFormat) {
    match format {
        OutputFormat::Terminal => {
            let is_tty = io::stderr().is_terminal();
            let mut emitter = TerminalEmitter::<io::Stderr>::stderr(ColorMode::Auto, is_tty);
            render_report(report, &mut emitter);
        }
        OutputFormat::Json => {
            let stdout = io::stdout();
            let mut emitter = JsonEmitter::new(stdout.lock());
            emitter.begin();
            render_report(report, &mut emitter);
            emitter.end();
            emitter.flush();
        }
    }
}

/// Run `ori build`. Returns the process exit code.
pub fn build_project(args: &BuildArgs) -> i32 {
    let Some(command) = args.engine_command() else {
        eprintln!("error: no compile engine configured");
        eprintln!("Pass --engine=<command> or set {ENGINE_ENV}.");
        eprintln!("Example: ori build src --engine=\"oric-engine --out={{out}} {{file}}\"");
        return 2;
    };
    let Some(mut engine) = CommandEngine::parse(&command) else {
        eprintln!("error: empty compile engine command");
        return 2;
    };
    if let Some(out) = &args.output_dir {
        engine = engine.with_output_dir(out);
    }

    let orchestrator = Orchestrator::new(args.config(), Arc::new(engine));
    tracing::debug!(path = %args.path.display(), engine = %command, "starting build");

    match args.watch {
        None => build_once(&orchestrator, args.mode(), args.format),
        Some(interval) => watch(&orchestrator, args, interval),
    }
}

fn build_once(orchestrator: &Orchestrator, mode: BuildMode, format: OutputFormat) -> i32 {
    let progress = ConsoleProgress::default();
    let sink: &dyn ProgressSink = match format {
        OutputFormat::Terminal => &progress,
        OutputFormat::Json => &(),
    };

    match orchestrator.build(mode, &mut (), sink) {
        Ok(outcome) => {
            print_report(&outcome.report, format);
            i32::from(!outcome.succeeded())
        }
        Err(err) => {
            report_error(&err, format);
            1
        }
    }
}

fn report_error(err: &BuildError, format: OutputFormat) {
    tracing::debug!(%err, "build did not run");
    print_report(&BuildReport::failed(err), format);
}

/// Rebuild whenever sources change. Reuses one orchestrator so errant units
/// and the change baseline carry over between iterations.
fn watch(orchestrator: &Orchestrator, args: &BuildArgs, interval: Duration) -> i32 {
    let mut mode = args.mode();
    let mut first = true;
    loop {
        match orchestrator.build(mode, &mut (), &()) {
            Ok(outcome) => {
                if first || outcome.compiled > 0 || !outcome.completed {
                    print_report(&outcome.report, args.format);
                    if args.format == OutputFormat::Terminal {
                        eprintln!("Watching {} for changes...", args.path.display());
                    }
                }
            }
            Err(err) => report_error(&err, args.format),
        }
        if args.format == OutputFormat::Json {
            io::stdout().flush().ok();
        }
        first = false;
        mode = BuildMode::Auto;
        std::thread::sleep(interval);
    }
}
