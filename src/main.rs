//! CLI entry point: parse arguments, wire the pipeline, map errors to exit
//! codes.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use vibesafe::cli::{Command, RootArgs};
use vibesafe::config::Config;
use vibesafe::error::{Error, Result, EXIT_FAILURE};
use vibesafe::introspect::PythonIntrospector;
use vibesafe::provider::{HttpProvider, Provider};
use vibesafe::spec::scan::select_units;
use vibesafe::workflow::{
    compile_many, freeze_http_deps, pool::CancelToken, pool::DEFAULT_WORKERS,
    report_compile_results, run_check, run_diff, run_init, run_scan, run_status, save_unit,
    test_unit, Pipeline,
};

fn main() -> ExitCode {
    let args = RootArgs::parse();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            if let Some(hint) = err.remediation() {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(args: RootArgs) -> Result<ExitCode> {
    let start = match &args.project {
        Some(project) => project.clone(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    if let Command::Init(init_args) = &args.command {
        run_init(&start, init_args.force)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = match &args.project {
        Some(project) => Config::load(project)?,
        None => Config::discover(&start)?,
    };
    let introspector = PythonIntrospector::new(config.root.clone());
    let config_for_factory = config.clone();
    let factory =
        move |provider_config: &vibesafe::config::ProviderConfig| -> Result<Box<dyn Provider>> {
            let api_key = config_for_factory.api_key(provider_config)?;
            let provider = HttpProvider::new(provider_config.clone(), api_key)?;
            Ok(Box::new(provider))
        };
    let pipeline = Pipeline::new(&config, &introspector, &factory);

    match args.command {
        Command::Init(_) => unreachable!("handled before config discovery"),
        Command::Scan(_) => {
            let specs = pipeline.scan()?;
            run_scan(&pipeline, &specs)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Compile(compile_args) => {
            let specs = pipeline.scan()?;
            let selected = select_units(&specs, compile_args.target.as_deref())?;
            let workers = compile_args.workers.unwrap_or(DEFAULT_WORKERS);
            println!(
                "compiling {} unit(s) with {} worker(s)",
                selected.len(),
                workers.clamp(1, selected.len().max(1))
            );
            let results = compile_many(
                &pipeline,
                &selected,
                compile_args.force,
                workers,
                &CancelToken::new(),
            );
            let failed = report_compile_results(&results);
            if failed {
                // Provider failures dominate the exit code when present.
                if let Some((_, Err(err))) = results
                    .iter()
                    .find(|(_, result)| matches!(result, Err(Error::Provider(_))))
                {
                    return Ok(ExitCode::from(err.exit_code() as u8));
                }
                return Ok(ExitCode::from(EXIT_FAILURE as u8));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Test(test_args) => {
            let specs = pipeline.scan()?;
            let selected = select_units(&specs, test_args.target.as_deref())?;
            let mut failed = false;
            for spec in &selected {
                match test_unit(&pipeline, spec) {
                    Ok(report) if report.passed() => {
                        println!("{}: ok ({} examples)", spec.unit_id, report.example_count);
                    }
                    Ok(report) => {
                        failed = true;
                        for failure in report.failures() {
                            println!(
                                "{}: gate {} failed: {}",
                                spec.unit_id,
                                failure.gate.as_str(),
                                failure.detail
                            );
                        }
                    }
                    Err(err) => {
                        failed = true;
                        println!("{}: {err}", spec.unit_id);
                        if let Some(hint) = err.remediation() {
                            println!("  hint: {hint}");
                        }
                    }
                }
            }
            Ok(if failed {
                ExitCode::from(EXIT_FAILURE as u8)
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Save(save_args) => {
            let specs = pipeline.scan()?;
            let selected = select_units(&specs, save_args.target.as_deref())?;
            for spec in &selected {
                save_unit(&pipeline, spec)?;
            }
            if save_args.freeze_http_deps {
                freeze_http_deps(&pipeline, &selected)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Diff(diff_args) => {
            let specs = pipeline.scan()?;
            let selected = select_units(&specs, diff_args.target.as_deref())?;
            run_diff(&pipeline, &selected)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Status(_) => {
            let specs = pipeline.scan()?;
            run_status(&pipeline, &specs)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check(_) => {
            let specs = pipeline.scan()?;
            let ok = run_check(&pipeline, &specs)?;
            Ok(if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_FAILURE as u8)
            })
        }
    }
}
