use clap::{
    crate_description, crate_name, crate_version, value_parser, Arg, ArgAction, ArgMatches,
    Command,
};
use log::{error, info, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use tutorplan::assign::quality::dcg_quality;
use tutorplan::assign::{AssignmentProblem, AssignmentStrategy, FlowAssigner, IlpAssigner};
use tutorplan::config::{Config, Strategy};
use tutorplan::flow::SuccessiveShortestPaths;
use tutorplan::former::form_groups;
#[cfg(feature = "cbc")]
use tutorplan::ilp::CbcSolver as Backend;
#[cfg(not(feature = "cbc"))]
use tutorplan::ilp::MicroLpSolver as Backend;
use tutorplan::io::simple::ProblemData;
use tutorplan::schedule::{schedule_presentations, Presentation, ScheduleProblem};
use tutorplan::substitutes::{find_substitutes, SubstitutePool};
use tutorplan::{AssignedGroup, Outcome, TopicAssignment};

/// Exit code if the solver did not find a (complete) solution
const NO_SOLUTION: exitcode::ExitCode = 1;

type CliResult<T> = Result<T, exitcode::ExitCode>;

fn main() {
    env_logger::init();
    let args = build_cli().get_matches();
    let code = match run(&args) {
        Ok(code) | Err(code) => code,
    };
    std::process::exit(code);
}

fn input_arg() -> Arg {
    Arg::new("INPUT")
        .help("Input JSON file with groups, topics, tutors and dates")
        .required(true)
}

fn assignment_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("strategy")
                .long("strategy")
                .value_name("STRATEGY")
                .help("Assignment formulation: 'ilp' or 'flow'")
                .value_parser(value_parser!(Strategy)),
        )
        .arg(
            Arg::new("balance")
                .long("balance")
                .value_name("GROUPS")
                .help("Maximum difference of the number of groups between any two tutors")
                .value_parser(value_parser!(u32)),
        )
}

fn build_cli() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .global(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write the result as JSON into this file")
                .global(true),
        )
        .arg(
            Arg::new("print")
                .short('p')
                .long("print")
                .help("Print the result in a human readable format (default without --output)")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("time_limit")
                .long("time-limit")
                .value_name("SECONDS")
                .help("Wall clock time limit per solver invocation")
                .value_parser(value_parser!(f64))
                .global(true),
        )
        .subcommand(assignment_args(
            Command::new("assign")
                .about("Assign topics and tutors to groups")
                .arg(input_arg()),
        ))
        .subcommand(
            Command::new("form")
                .about("Merge incomplete groups into complete teams")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("schedule")
                .about("Schedule the final presentations of assigned groups")
                .arg(input_arg()),
        )
        .subcommand(assignment_args(
            Command::new("plan")
                .about("Assign topics, then schedule presentations and find substitute evaluators")
                .arg(input_arg()),
        ))
}

fn run(args: &ArgMatches) -> CliResult<exitcode::ExitCode> {
    let (name, sub_args) = args.subcommand().ok_or(exitcode::USAGE)?;
    let config = load_config(sub_args)?;
    let data = read_input(sub_args)?;
    let print = sub_args.get_flag("print") || sub_args.get_one::<String>("output").is_none();

    match name {
        "assign" => {
            let outcome = assign(&data, &config)?;
            let quality = dcg_quality(&data.groups, outcome.items());
            if outcome.is_success() {
                info!("Assignment quality: {:.1}", quality);
            }
            write_output(sub_args, |w| {
                tutorplan::io::simple::write_assignment(w, &outcome, quality)
            })?;
            if print {
                print!(
                    "{}",
                    tutorplan::io::format_assignment(
                        &outcome,
                        &data.groups,
                        &data.topics,
                        &data.tutors
                    )
                );
            }
            Ok(exit_code(outcome.is_success()))
        }
        "form" => {
            let outcome = form_groups(
                &data.groups,
                &data.topics,
                &config.formation.weights,
                &Backend,
                &config.limits,
            )
            .map_err(input_error)?;
            write_output(sub_args, |w| {
                tutorplan::io::simple::write_formation(w, &outcome)
            })?;
            if print {
                print!("{}", tutorplan::io::format_formation(&outcome));
            }
            Ok(exitcode::OK)
        }
        "schedule" => {
            let (outcome, substitutes) = schedule(&data, &data.assigned_groups, &config)?;
            write_output(sub_args, |w| {
                tutorplan::io::simple::write_schedule(w, &outcome, &substitutes)
            })?;
            if print {
                print!(
                    "{}",
                    tutorplan::io::format_schedule(&outcome, &substitutes, &data.tutors)
                );
            }
            Ok(exit_code(outcome.is_success()))
        }
        "plan" => {
            let assignment = assign(&data, &config)?;
            let quality = dcg_quality(&data.groups, assignment.items());
            let assigned_groups: Vec<AssignedGroup> = assignment
                .items()
                .iter()
                .map(|a| {
                    let available = data
                        .groups
                        .iter()
                        .find(|g| g.id == a.group)
                        .map(|g| g.available.clone())
                        .unwrap_or_default();
                    a.into_assigned_group(available)
                })
                .collect();
            let (outcome, substitutes) = if assignment.is_success() {
                schedule(&data, &assigned_groups, &config)?
            } else {
                warn!("Skipping the presentation schedule, since the assignment failed");
                (Outcome::success(Vec::new()), Vec::new())
            };
            write_output(sub_args, |w| {
                tutorplan::io::simple::write_plan(w, &assignment, quality, &outcome, &substitutes)
            })?;
            if print {
                print!(
                    "{}",
                    tutorplan::io::format_assignment(
                        &assignment,
                        &data.groups,
                        &data.topics,
                        &data.tutors
                    )
                );
                if assignment.is_success() {
                    print!(
                        "{}",
                        tutorplan::io::format_schedule(&outcome, &substitutes, &data.tutors)
                    );
                }
            }
            Ok(exit_code(assignment.is_success() && outcome.is_success()))
        }
        _ => Err(exitcode::USAGE),
    }
}

fn exit_code(success: bool) -> exitcode::ExitCode {
    if success {
        exitcode::OK
    } else {
        NO_SOLUTION
    }
}

/// Log an input contract violation and map it to an exit code
fn input_error(e: tutorplan::Error) -> exitcode::ExitCode {
    error!("{}", e);
    match e {
        tutorplan::Error::Config(_) => exitcode::CONFIG,
        tutorplan::Error::Io(_) => exitcode::IOERR,
        _ => exitcode::DATAERR,
    }
}

/// Read the configuration file (if any) and apply the command line overrides.
fn load_config(args: &ArgMatches) -> CliResult<Config> {
    let mut config = match args.get_one::<String>("config") {
        Some(path) => {
            let file = File::open(path).map_err(|e| {
                error!("Could not open config file {}: {}", path, e);
                exitcode::NOINPUT
            })?;
            Config::from_reader(BufReader::new(file)).map_err(|e| {
                error!("Could not read config file {}: {}", path, e);
                exitcode::CONFIG
            })?
        }
        None => Config::default(),
    };

    if let Some(limit) = args.get_one::<f64>("time_limit") {
        config.limits.time_limit = Some(*limit);
    }
    if let Ok(Some(strategy)) = args.try_get_one::<Strategy>("strategy") {
        config.assignment.strategy = *strategy;
    }
    if let Ok(Some(balance)) = args.try_get_one::<u32>("balance") {
        config.assignment.balance_limit = *balance;
    }
    config.validate().map_err(input_error)?;
    Ok(config)
}

fn read_input(args: &ArgMatches) -> CliResult<ProblemData> {
    let path = args.get_one::<String>("INPUT").ok_or(exitcode::USAGE)?;
    let file = File::open(path).map_err(|e| {
        error!("Could not open input file {}: {}", path, e);
        exitcode::NOINPUT
    })?;
    let data = tutorplan::io::simple::read(BufReader::new(file)).map_err(|e| {
        error!("Could not parse input file {}: {}", path, e);
        exitcode::DATAERR
    })?;
    info!(
        "Read {} groups, {} topics, {} tutors, {} assigned groups and {} dates",
        data.groups.len(),
        data.topics.len(),
        data.tutors.len(),
        data.assigned_groups.len(),
        data.dates.len()
    );
    Ok(data)
}

fn write_output<F>(args: &ArgMatches, write: F) -> CliResult<()>
where
    F: FnOnce(BufWriter<File>) -> tutorplan::Result<()>,
{
    if let Some(path) = args.get_one::<String>("output") {
        let file = File::create(path).map_err(|e| {
            error!("Could not create output file {}: {}", path, e);
            exitcode::CANTCREAT
        })?;
        write(BufWriter::new(file)).map_err(|e| {
            error!("Could not write output file {}: {}", path, e);
            exitcode::IOERR
        })?;
        info!("Result written to {}", path);
    }
    Ok(())
}

fn assign(data: &ProblemData, config: &Config) -> CliResult<Outcome<TopicAssignment>> {
    let problem = AssignmentProblem {
        groups: &data.groups,
        topics: &data.topics,
        tutors: &data.tutors,
        balance_limit: config.assignment.balance_limit,
    };
    let outcome = match config.assignment.strategy {
        Strategy::Ilp => IlpAssigner::new(
            Backend,
            config.limits.clone(),
            config.assignment.weights.clone(),
        )
        .assign(&problem),
        Strategy::Flow => FlowAssigner::new(SuccessiveShortestPaths).assign(&problem),
    };
    outcome.map_err(input_error)
}

fn schedule(
    data: &ProblemData,
    groups: &[AssignedGroup],
    config: &Config,
) -> CliResult<(Outcome<Presentation>, Vec<SubstitutePool>)> {
    let problem = ScheduleProblem {
        groups,
        tutors: &data.tutors,
        dates: &data.dates,
    };
    let outcome = schedule_presentations(&problem, &config.schedule, &Backend, &config.limits)
        .map_err(input_error)?;
    let substitutes = find_substitutes(outcome.items(), &data.tutors);
    Ok((outcome, substitutes))
}
