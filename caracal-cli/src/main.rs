use std::env;
use std::fs;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::{Context, Error};
use clap::{App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info, Level, LevelFilter, Record};

use caracal::{check, Direction, SearchConfig, Verdict};
use caracal_aiger::Aig;

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{:#}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "{}", record.args())
        } else {
            writeln!(buf, "{}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("CARACAL_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is caracal {}", env!("CARGO_PKG_VERSION"));
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("caracal")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("<AIG> 'The AIGER circuit to check'")
        .arg_from_usage("[OUTPUT-DIR] 'Directory to place the witness file in'")
        .arg(
            Arg::from_usage("--forward 'Search forward from the initial state'")
                .conflicts_with("backward"),
        )
        .arg_from_usage("--backward 'Search backward from the bad region (default)'")
        .arg_from_usage("--rotate 'Order assumption tails by prior unsat-core participation'")
        .arg_from_usage("--mom 'Order subsumption-filter assumptions by MOM weights'")
        .arg_from_usage("--no-witness 'Decide only, do not write a witness file'")
        .arg_from_usage(
            "[config-file] --config=[FILE] 'Read parameters from a TOML configuration file'",
        )
        .get_matches();

    init_logging();
    banner();

    let mut config = SearchConfig::default();
    if let Some(config_path) = matches.value_of("config-file") {
        let config_contents = fs::read_to_string(config_path)
            .with_context(|| format!("cannot read configuration file '{}'", config_path))?;
        config = toml::from_str(&config_contents)
            .with_context(|| format!("cannot parse configuration file '{}'", config_path))?;
    }
    if matches.is_present("forward") {
        config.direction = Direction::Forward;
    }
    if matches.is_present("backward") {
        config.direction = Direction::Backward;
    }
    if matches.is_present("rotate") {
        config.rotate = true;
    }
    if matches.is_present("mom") {
        config.mom = true;
    }

    let aig_path = matches.value_of("AIG").unwrap();
    info!("Reading circuit '{}'", aig_path);
    let file = fs::File::open(aig_path)
        .with_context(|| format!("cannot open circuit '{}'", aig_path))?;
    let aig = Aig::parse(file).with_context(|| format!("cannot parse circuit '{}'", aig_path))?;
    info!(
        "{} inputs, {} latches, {} gates",
        aig.num_inputs(),
        aig.num_latches(),
        aig.ands.len()
    );

    // A panic past this point is a checker bug, not an input problem.
    let verdict = match panic::catch_unwind(AssertUnwindSafe(|| check(&aig, &config))) {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(model_error)) => {
            error!("{}", model_error);
            return Ok(1);
        }
        Err(_) => {
            error!("internal invariant violation");
            return Ok(2);
        }
    };

    match &verdict {
        Verdict::Safe { invariant } => {
            info!("invariant with {} cubes", invariant.len());
            println!("SAFE");
        }
        Verdict::Unsafe { inputs, .. } => {
            info!("counterexample with {} steps", inputs.len());
            println!("UNSAFE");
        }
        Verdict::Unknown { reason } => {
            info!("{}", reason);
            println!("UNKNOWN");
        }
    }

    if let (Some(output_dir), false) = (matches.value_of("OUTPUT-DIR"), matches.is_present("no-witness")) {
        let stem = Path::new(aig_path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "witness".to_string());
        let witness_path = Path::new(output_dir).join(format!("{}.res", stem));
        let mut writer = io_buf_writer(&witness_path)?;
        caracal::write_witness(&verdict, &mut writer)
            .with_context(|| format!("cannot write witness '{}'", witness_path.display()))?;
        info!("witness written to '{}'", witness_path.display());
    }

    Ok(0)
}

fn io_buf_writer(path: &Path) -> Result<std::io::BufWriter<fs::File>, Error> {
    let file = fs::File::create(path)
        .with_context(|| format!("cannot create witness file '{}'", path.display()))?;
    Ok(std::io::BufWriter::new(file))
}
