//! Command-line argument parsing for lecturebell

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub once: bool,
    pub validate: bool,
    pub help: bool,
    pub division: Option<String>,
    /// Some(true) for --notify, Some(false) for --no-notify
    pub notify: Option<bool>,
    pub week: bool,
    pub search: Option<String>,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

/// Parse an argv-style list (first entry is the program name)
pub fn parse_args_from(args: &[String]) -> Args {
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" => result.once = true,
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            "--week" => result.week = true,
            "--notify" => result.notify = Some(true),
            "--no-notify" => result.notify = Some(false),
            "--division" | "-d" => {
                if i + 1 < args.len() {
                    i += 1;
                    result.division = Some(args[i].clone());
                }
            }
            "--search" => {
                if i + 1 < args.len() {
                    i += 1;
                    result.search = Some(args[i].clone());
                }
            }
            _ => {}
        }
        i += 1;
    }

    result
}

pub fn print_help() {
    println!("lecturebell - timetable viewer with lecture alerts\n");
    println!("USAGE:");
    println!("    lecturebell [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --once                  Print today's status and schedule, then exit");
    println!("    --division, -d NAME     Select a division (name, 'ii' or '2')");
    println!("    --notify                Enable lecture alerts");
    println!("    --no-notify             Disable lecture alerts (console: until the next start)");
    println!("    --week                  Include the full week timetable");
    println!("    --search TEXT           Filter today's schedule");
    println!("    --validate              Validate configuration and exit");
    println!("    --help, -h              Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    See .env.example for configuration variables");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        std::iter::once("lecturebell")
            .chain(items.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args_default() {
        let result = parse_args_from(&argv(&[]));
        assert_eq!(result, Args::default());
    }

    #[test]
    fn test_parse_args_once() {
        let result = parse_args_from(&argv(&["--once"]));
        assert!(result.once);
        assert!(!result.validate);
    }

    #[test]
    fn test_parse_args_validate() {
        let result = parse_args_from(&argv(&["--validate"]));
        assert!(result.validate);
    }

    #[test]
    fn test_parse_args_help() {
        assert!(parse_args_from(&argv(&["--help"])).help);
        assert!(parse_args_from(&argv(&["-h"])).help);
    }

    #[test]
    fn test_parse_args_division() {
        let result = parse_args_from(&argv(&["--division", "Division II"]));
        assert_eq!(result.division, Some("Division II".to_string()));

        let result = parse_args_from(&argv(&["-d", "3"]));
        assert_eq!(result.division, Some("3".to_string()));
    }

    #[test]
    fn test_parse_args_missing_value_ignored() {
        let result = parse_args_from(&argv(&["--division"]));
        assert_eq!(result.division, None);
        let result = parse_args_from(&argv(&["--search"]));
        assert_eq!(result.search, None);
    }

    #[test]
    fn test_parse_args_notify_last_wins() {
        assert_eq!(parse_args_from(&argv(&["--notify"])).notify, Some(true));
        assert_eq!(parse_args_from(&argv(&["--notify", "--no-notify"])).notify, Some(false));
    }

    #[test]
    fn test_parse_args_multiple_flags() {
        let result = parse_args_from(&argv(&["--once", "--week", "--search", "maths", "--bogus"]));
        assert!(result.once);
        assert!(result.week);
        assert_eq!(result.search, Some("maths".to_string()));
    }
}
