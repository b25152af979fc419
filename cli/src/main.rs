use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use vroute_common::db::core::DesignDB;
use vroute_common::db::parser::design::{self, RuleRecord};
use vroute_common::db::parser::{geometry, guide};
use vroute_common::util::config::Config;
use vroute_common::util::generator::{self, GeneratorParams};
use vroute_common::util::{check, logger};
use vroute_router::grid::adjust;
use vroute_router::post::merge_split_nets;
use vroute_router::report::write_congestion_report;
use vroute_rules::{RuleDb, compile};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Global routing: writes route guides for the design.
    Route,
    /// Compiles the design's rule records and prints a summary.
    Rules,
    /// Merge/split pass and short check over a net geometry file.
    Postprocess {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to `input.geometry_output` from the config.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Generate {
        #[arg(long, default_value_t = 1000)]
        nets: usize,
        #[arg(long, default_value_t = 200_000)]
        die_size: i64,
        #[arg(long, default_value_t = 6)]
        metal_layers: usize,
        #[arg(long, default_value_t = 200)]
        pitch: i64,
        #[arg(long, default_value_t = 4)]
        macros: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(long, default_value = "inputs/random.toml")]
        output: String,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Route);

    match command {
        Commands::Generate {
            nets,
            die_size,
            metal_layers,
            pitch,
            macros,
            seed,
            output,
        } => {
            prepare_output_dir(Path::new(&output))?;
            let params = GeneratorParams {
                nets,
                die_size,
                metal_layers,
                pitch,
                macros,
                seed,
            };
            generator::generate_random_design(&output, params)?;
            log::info!("Generated: {}", output);
        }
        Commands::Rules => {
            let (mut db, records) = load_design(&config)?;
            compile_rules(&mut db, &records, &config)?;
        }
        Commands::Route => {
            if let Err(e) = run_routing(&config) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Postprocess { input, output } => {
            let output =
                output.unwrap_or_else(|| PathBuf::from(&config.input.geometry_output));
            if let Err(e) = run_postprocess(&config, &input, &output) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn prepare_output_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
        && !parent.as_os_str().is_empty()
    {
        log::info!("Creating output directory: {:?}", parent);
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn load_design(config: &Config) -> anyhow::Result<(DesignDB, Vec<RuleRecord>)> {
    let path = Path::new(&config.input.design_file);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Design file missing: '{}'. Run 'generate' or set input.design_file.",
            config.input.design_file
        ));
    }
    log::info!("Parsing design: {}", config.input.design_file);
    design::load(path)
}

fn compile_rules(
    db: &mut DesignDB,
    records: &[RuleRecord],
    config: &Config,
) -> anyhow::Result<RuleDb> {
    let (rules, report) = compile(&db.tech, records, config.rules.scale)
        .map_err(|e| anyhow::anyhow!("Rule compilation aborted: {}", e))?;
    let tagged = vroute_rules::compile::assign_via_cut_classes(&mut db.tech, &rules);
    log::info!(
        "Rules: {} compiled, {} cut classes, {} overridden, {} skipped, {} unknown properties",
        report.compiled,
        report.cut_classes,
        report.overridden,
        report.skipped,
        report.unknown_properties
    );
    for layer in &db.tech.layers {
        let count = rules
            .all()
            .filter(|&(id, _)| rules.layer_of(id) == layer.id)
            .count();
        if count > 0 {
            log::info!("  {}: {} constraints", layer.name, count);
        }
    }
    log::info!("Tagged {} via definitions with a cut class", tagged);
    Ok(rules)
}

fn run_routing(config: &Config) -> anyhow::Result<()> {
    let (mut db, records) = load_design(config)?;
    let rules = compile_rules(&mut db, &records, config)?;
    let gr = &config.global_routing;

    let mut imported = guide::GuideMap::new();
    if let Some(path) = &config.input.guide_input {
        let range = adjust::signal_range(gr, db.tech.num_routing_layers())
            .map_err(|e| anyhow::anyhow!(e))?;
        guide::import_guides(Path::new(path), &db, range, &mut imported)
            .map_err(|e| anyhow::anyhow!("Guide import rejected: {}", e))?;
    }

    log::info!("Starting Routing...");
    let cancel = AtomicBool::new(false);
    let mut outcome = vroute_router::route(&db, Some(&rules), gr, &cancel)
        .map_err(|e| anyhow::anyhow!("Routing failed: {}", e))?;
    for (net, mut list) in imported {
        outcome.guides.entry(net).or_default().append(&mut list);
    }

    let guide_path = Path::new(&config.input.guide_output);
    prepare_output_dir(guide_path)?;
    log::info!("Writing guides to {:?}", guide_path);
    guide::write_guides(BufWriter::new(File::create(guide_path)?), &db, &outcome.guides)?;

    if let Some(path) = &gr.congestion_report {
        prepare_output_dir(Path::new(path))?;
        log::info!("Writing congestion report to {}", path);
        write_congestion_report(BufWriter::new(File::create(path)?), &outcome.report)?;
    }

    let mut ok = check::check_routes(&outcome.routes, &outcome.pin_tiles).is_ok();
    if !gr.allow_overflow {
        ok &= check::check_capacity(outcome.usage.iter().copied(), gr.allowed_overflow_slack)
            .is_ok();
        if outcome.report.failed() > 0 {
            log::error!("{} nets failed to route", outcome.report.failed());
            ok = false;
        }
    }
    if ok {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Verification failed"))
    }
}

fn run_postprocess(config: &Config, input: &Path, output: &Path) -> anyhow::Result<()> {
    let (db, _) = load_design(config)?;
    let mut nets = geometry::load(input, &db)?;
    if config.post_process.merge_split {
        nets = merge_split_nets(&db.tech, &nets).0;
    }
    prepare_output_dir(output)?;
    geometry::save(output, &db, &nets)?;
    if config.post_process.check_shorts {
        check::check_geometry(&db.tech, &nets).map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}
