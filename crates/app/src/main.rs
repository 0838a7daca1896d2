use std::path::PathBuf;
use std::process;

use texgraph_core::PointInfo;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

mod plan;

struct Args {
    plan_path: Option<PathBuf>,
    load_path: Option<PathBuf>,
    save_path: Option<PathBuf>,
    samples: Vec<[f64; 3]>,
    size: [f64; 3],
    time: f64,
    log_level: LevelFilter,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        plan_path: None,
        load_path: None,
        save_path: None,
        samples: Vec::new(),
        size: [0.0; 3],
        time: 0.0,
        log_level: LevelFilter::INFO,
    };
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .ok_or_else(|| format!("{arg} requires a value"))
        };
        match arg.as_str() {
            "--plan" => parsed.plan_path = Some(PathBuf::from(value()?)),
            "--load" => parsed.load_path = Some(PathBuf::from(value()?)),
            "--save" => parsed.save_path = Some(PathBuf::from(value()?)),
            "--sample" => parsed.samples.push(parse_triple(arg, value()?)?),
            "--size" => parsed.size = parse_triple(arg, value()?)?,
            "--time" => {
                parsed.time = value()?
                    .parse()
                    .map_err(|_| "--time expects a number".to_string())?;
            }
            "--log-level" => {
                parsed.log_level = value()?
                    .parse()
                    .map_err(|_| "--log-level expects error, warn, info, debug or trace".to_string())?;
            }
            "--help" => {
                print_help();
                process::exit(0);
            }
            other => return Err(format!("unknown argument {other}")),
        }
    }

    Ok(parsed)
}

fn parse_triple(flag: &str, value: &str) -> Result<[f64; 3], String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("{flag} {value}: {err}"))?;
    match parts.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        [x, y] => Ok([*x, *y, 0.0]),
        _ => Err(format!("{flag} expects x,y[,z]")),
    }
}

fn print_help() {
    println!(
        "texgraph options:\n  --plan <path>       JSON procedure plan\n  --load <path>       binary procedure (uses the plan's sinks)\n  --save <path>       write the procedure as binary\n  --sample x,y[,z]    evaluate every sink at a point (repeatable)\n  --size dx,dy[,dz]   footprint of each sample\n  --time <t>\n  --log-level <level>"
    );
}

fn run(args: Args) -> Result<(), String> {
    let plan = match &args.plan_path {
        Some(path) => plan::load_plan(path)?,
        None => plan::Plan::default(),
    };

    let mut procedure = if let Some(path) = &args.load_path {
        let bytes = std::fs::read(path).map_err(|err| err.to_string())?;
        let procedure = plan::load_binary(&plan, &bytes)?;
        tracing::info!("loaded {:?}", path);
        procedure
    } else {
        plan::build(&plan)?
    };

    if let Some(path) = &args.save_path {
        let bytes = procedure.to_bytes().map_err(|err| err.to_string())?;
        std::fs::write(path, bytes).map_err(|err| err.to_string())?;
        tracing::info!("saved procedure to {:?}", path);
    }

    for [x, y, z] in &args.samples {
        let point = PointInfo::new(*x, *y, *z)
            .with_size(args.size[0], args.size[1], args.size[2])
            .with_time(args.time);
        let report = plan::sample(&mut procedure, &point);
        let json = serde_json::to_string(&report).map_err(|err| err.to_string())?;
        println!("{json}");
    }

    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(parsed.log_level))
        .init();

    tracing::info!("texgraph starting");

    if let Err(err) = run(parsed) {
        tracing::error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("texgraph")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_samples_and_levels() {
        let parsed = parse_args(&args(&[
            "--sample",
            "1,2,3",
            "--sample",
            "0.5, -1",
            "--size",
            "0.1,0.1",
            "--log-level",
            "debug",
        ]))
        .expect("args");
        assert_eq!(parsed.samples, vec![[1.0, 2.0, 3.0], [0.5, -1.0, 0.0]]);
        assert_eq!(parsed.size, [0.1, 0.1, 0.0]);
        assert_eq!(parsed.log_level, LevelFilter::DEBUG);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(&args(&["--sample", "1"])).is_err());
        assert!(parse_args(&args(&["--sample", "a,b"])).is_err());
        assert!(parse_args(&args(&["--plan"])).is_err());
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
        assert!(parse_args(&args(&["--log-level", "loud"])).is_err());
    }
}
