//! A simple CLI tool for checking election results offline.
//! This reuses the server's own tally implementation, and reads exactly what
//! `GET /elections/<election_id>` returns.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use votekeep_backend::model::api::election::{ElectionResults, OptionResult};

const PROGRAM_NAME: &str = "results-cli";

const ABOUT_TEXT: &str = "Check the statistics in a votekeep results dump.

EXIT CODES:
     0: The results are consistent.
   255: Ran successfully, but the claimed statistics disagree with the counts.
 Other: Error.";

const RESULTS_PATH: &str = "RESULTS_PATH";

const RESULTS_PATH_HELP: &str = "The path to a JSON dump of a specific election,\n\
as returned by `GET /elections/<election_id>`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(RESULTS_PATH)
            .help(RESULTS_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// The dump's derived fields are wrong.
    Inconsistent(Vec<Discrepancy>),
}

/// One derived field whose claimed value differs from the recomputed one.
#[derive(Debug, PartialEq)]
struct Discrepancy {
    field: String,
    claimed: String,
    actual: String,
}

impl Discrepancy {
    fn new(field: impl Into<String>, claimed: impl Display, actual: impl Display) -> Self {
        Self {
            field: field.into(),
            claimed: claimed.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl Display for Discrepancy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} is {} but the counts give {}",
            self.field, self.claimed, self.actual
        )
    }
}

/// A friendly summary line for one option.
#[derive(Debug, PartialEq)]
struct FriendlyResult {
    name: String,
    count: u64,
    percentage: f64,
    leading: bool,
}

impl Display for FriendlyResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} vote{} ({:.1}%){}",
            self.name,
            self.count,
            if self.count != 1 { "s" } else { "" },
            self.percentage,
            if self.leading { " - leading" } else { "" }
        )
    }
}

/// Percentages are transported as floats; allow for rounding on the way.
fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn leader_name(leader: &Option<String>) -> &str {
    leader.as_deref().unwrap_or("none")
}

/// Compare every derived field of `claimed` against a fresh computation.
fn discrepancies(claimed: &ElectionResults) -> Vec<Discrepancy> {
    let actual = match claimed.recomputed() {
        Ok(actual) => actual,
        Err(_) => {
            return vec![Discrepancy::new(
                "totalVotes",
                claimed.total_votes,
                format!("more than {}", u64::MAX),
            )]
        }
    };
    let mut found = Vec::new();
    if claimed.total_votes != actual.total_votes {
        found.push(Discrepancy::new(
            "totalVotes",
            claimed.total_votes,
            actual.total_votes,
        ));
    }
    if claimed.leader != actual.leader {
        found.push(Discrepancy::new(
            "leader",
            leader_name(&claimed.leader),
            leader_name(&actual.leader),
        ));
    }
    for (claimed_option, actual_option) in claimed.options.iter().zip(&actual.options) {
        if !close_enough(claimed_option.percentage, actual_option.percentage) {
            found.push(Discrepancy::new(
                format!("percentage of '{}'", claimed_option.name),
                claimed_option.percentage,
                actual_option.percentage,
            ));
        }
    }
    let mut names = std::collections::HashSet::new();
    for OptionResult { name, .. } in &claimed.options {
        if !names.insert(name.as_str()) {
            found.push(Discrepancy::new(
                format!("option '{name}'"),
                "listed more than once",
                "unique names",
            ));
        }
    }
    found
}

/// Load a dump and check it.
fn check(path: &str) -> Result<Vec<FriendlyResult>, Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let results: ElectionResults =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    let found = discrepancies(&results);
    if !found.is_empty() {
        return Err(Error::Inconsistent(found));
    }

    Ok(results
        .options
        .into_iter()
        .map(|option| FriendlyResult {
            leading: results.leader.as_deref() == Some(option.name.as_str()),
            name: option.name,
            count: option.count,
            percentage: option.percentage,
        })
        .collect())
}

/// Run the check, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(RESULTS_PATH).unwrap(); // Required argument is guaranteed to be present.
    match check(path) {
        Ok(friendly_results) => {
            println!("Results are consistent.");
            for result in friendly_results {
                println!("{result}");
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::Inconsistent(found)) => {
            println!("Results are inconsistent:");
            for discrepancy in found {
                println!("  {discrepancy}");
            }
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checking() {
        // This test enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["votekeep_backend"], None, None);

        let expected = vec![
            FriendlyResult {
                name: "Alice".to_string(),
                count: 3,
                percentage: 30.0,
                leading: false,
            },
            FriendlyResult {
                name: "Bob".to_string(),
                count: 7,
                percentage: 70.0,
                leading: true,
            },
        ];
        assert_eq!(check("example_dumps/election.json"), Ok(expected));

        let expected = vec![
            FriendlyResult {
                name: "Pizza".to_string(),
                count: 0,
                percentage: 0.0,
                leading: true,
            },
            FriendlyResult {
                name: "Salad".to_string(),
                count: 0,
                percentage: 0.0,
                leading: false,
            },
        ];
        assert_eq!(check("example_dumps/election_no_votes.json"), Ok(expected));

        assert_eq!(
            check("example_dumps/election_invalid_totals.json"),
            Err(Error::Inconsistent(vec![Discrepancy::new("totalVotes", 11, 10)]))
        );
        assert_eq!(
            check("example_dumps/election_invalid_leader.json"),
            Err(Error::Inconsistent(vec![Discrepancy::new(
                "leader", "Alice", "Bob"
            )]))
        );
        assert_eq!(
            check("example_dumps/election_overflow.json"),
            Err(Error::Inconsistent(vec![Discrepancy::new(
                "totalVotes",
                u64::MAX,
                format!("more than {}", u64::MAX)
            )]))
        );
        assert!(matches!(
            check("example_dumps/election_malformed.json"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn correct_cli_usage() {
        let command_line = [PROGRAM_NAME, "example_dumps/election.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "example_dumps/election_invalid_totals.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);

        let command_line = [PROGRAM_NAME, "example_dumps/election_malformed.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
