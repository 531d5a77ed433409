use ferry::{Error, ReceiveArgs, Result, SendArgs};

const LOOP_HELP: &str = "\
-loop repeats the operations that follow it. Operations inside the loop are
written with a double dash. The optional argument is the number of
iterations, without it the loop runs until the process is stopped. Network
errors inside an iteration are logged and the next iteration starts; usage
errors stop the program.

Usage: wharf -loop --receive --send somewhereelse
       wharf -loop 10 --receive 5243 --dimensions
";

const TEST_HELP: &str = "\
-test sends an image to itself over a random local port and checks that it
arrives unchanged.

Usage: wharf -test
";

const HELP_HELP: &str = "\
-help lists the available operations, or describes the one given.

Usage: wharf -help send
";

const DUP_HELP: &str = "\
-dup duplicates the top image on the stack.

Usage: wharf -receive -dup -send hosta -pop -send hostb
";

const POP_HELP: &str = "\
-pop removes the top image from the stack.

Usage: wharf -receive -receive 5679 -pop -send
";

const DIMENSIONS_HELP: &str = "\
-dimensions prints the size of the top image as width x height x frames x channels.

Usage: wharf -receive -dimensions
";

/// Operation names and their help, in the order `-help` lists them.
pub const OPERATIONS: &[(&str, &str)] = &[
    ("-dimensions", DIMENSIONS_HELP),
    ("-dup", DUP_HELP),
    ("-help", HELP_HELP),
    ("-loop", LOOP_HELP),
    ("-pop", POP_HELP),
    ("-receive", ferry::ops::RECEIVE_HELP),
    ("-send", ferry::ops::SEND_HELP),
    ("-test", TEST_HELP),
];

pub fn help_for(name: &str) -> Option<&'static str> {
    let name = if name.starts_with('-') {
        name.to_owned()
    } else {
        format!("-{name}")
    };
    OPERATIONS
        .iter()
        .find(|(op, _)| *op == name)
        .map(|(_, help)| *help)
}

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Help(Option<String>),
    Test,
    Send(SendArgs),
    Receive(ReceiveArgs),
    Loop { count: Option<u64>, body: Vec<Op> },
    Dup,
    Pop,
    Dimensions,
}

/// `-name`, `--name`, ... as opposed to an argument like `5678` or `-1`.
fn is_op(token: &str) -> bool {
    let name = token.trim_start_matches('-');
    token.len() > name.len() && name.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn is_top_level_op(token: &str) -> bool {
    is_op(token) && !token.starts_with("--")
}

fn no_args(name: &str, args: &[String]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(Error::argument(format!("{name} takes no arguments")))
    }
}

fn parse_op(name: &str, rest: &[String]) -> Result<Op> {
    // everything up to the first nested (double dash) operation is an argument
    let split = rest.iter().position(|t| is_op(t)).unwrap_or(rest.len());
    let (args, nested) = rest.split_at(split);

    if name != "-loop" && !nested.is_empty() {
        return Err(Error::argument(format!(
            "'{}' can only be used inside -loop",
            nested[0]
        )));
    }

    match name {
        "-help" => match args {
            [] => Ok(Op::Help(None)),
            [op] => Ok(Op::Help(Some(op.clone()))),
            _ => Err(Error::argument("-help takes zero or one argument")),
        },
        "-test" => no_args(name, args).map(|_| Op::Test),
        "-send" => SendArgs::parse(args).map(Op::Send),
        "-receive" => ReceiveArgs::parse(args).map(Op::Receive),
        "-dup" => no_args(name, args).map(|_| Op::Dup),
        "-pop" => no_args(name, args).map(|_| Op::Pop),
        "-dimensions" => no_args(name, args).map(|_| Op::Dimensions),
        "-loop" => {
            let count = match args {
                [] => None,
                [n] => Some(n.parse::<u64>().map_err(|_| {
                    Error::argument(format!("-loop: '{n}' is not a number of iterations"))
                })?),
                _ => return Err(Error::argument("-loop takes zero or one argument")),
            };
            if nested.is_empty() {
                return Err(Error::argument("-loop needs at least one --operation"));
            }
            // strip one dash level, `--send` becomes `-send` inside the body
            let body: Vec<String> = nested
                .iter()
                .map(|t| {
                    if is_op(t) {
                        t[1..].to_owned()
                    } else {
                        t.clone()
                    }
                })
                .collect();
            Ok(Op::Loop {
                count,
                body: parse(&body)?,
            })
        }
        _ => Err(Error::argument(format!("unknown operation {name}"))),
    }
}

/// Turn a command line like `-receive 5243 -send otherhost` into operations.
/// The whole line is checked before anything runs.
pub fn parse(tokens: &[String]) -> Result<Vec<Op>> {
    let mut ops = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let name = &tokens[i];
        if !is_top_level_op(name) {
            return Err(Error::argument(if is_op(name) {
                format!("'{name}' can only be used inside -loop")
            } else {
                format!("expected an operation, got '{name}'")
            }));
        }

        let end = tokens[i + 1..]
            .iter()
            .position(|t| is_top_level_op(t))
            .map_or(tokens.len(), |p| i + 1 + p);
        ops.push(parse_op(name, &tokens[i + 1..end])?);
        i = end;
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn parses_a_pipeline() {
        let ops = parse(&line("-receive 5243 -dimensions -send otherhost 9000")).unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Receive(ReceiveArgs { port: 5243 }),
                Op::Dimensions,
                Op::Send(SendArgs {
                    host: "otherhost".to_owned(),
                    port: 9000
                }),
            ]
        );
    }

    #[test]
    fn defaults_apply() {
        let ops = parse(&line("-receive -send")).unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Receive(ReceiveArgs::default()),
                Op::Send(SendArgs::default())
            ]
        );
    }

    #[test]
    fn too_many_arguments_stop_everything() {
        let err = parse(&line("-receive -send a 1 b")).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));

        let err = parse(&line("-receive 1 2 -send")).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn loop_body_uses_double_dashes() {
        let ops = parse(&line("-loop 3 --receive 5243 --send far -dimensions")).unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Loop {
                    count: Some(3),
                    body: vec![
                        Op::Receive(ReceiveArgs { port: 5243 }),
                        Op::Send(SendArgs {
                            host: "far".to_owned(),
                            port: 5678
                        }),
                    ],
                },
                Op::Dimensions,
            ]
        );
    }

    #[test]
    fn loops_nest() {
        let ops = parse(&line("-loop 2 --loop 3 ---pop")).unwrap();
        assert_eq!(
            ops,
            vec![Op::Loop {
                count: Some(2),
                body: vec![Op::Loop {
                    count: Some(3),
                    body: vec![Op::Pop],
                }],
            }]
        );
    }

    #[test]
    fn loop_errors_are_found_up_front() {
        assert!(matches!(
            parse(&line("-loop --send a 1 b")),
            Err(Error::Argument(_))
        ));
        assert!(matches!(
            parse(&line("-loop many --pop")),
            Err(Error::Argument(_))
        ));
        assert!(matches!(
            parse(&line("-dup --pop")),
            Err(Error::Argument(_))
        ));
        assert!(matches!(parse(&line("--pop")), Err(Error::Argument(_))));
        // an empty body would spin forever
        assert!(matches!(parse(&line("-loop")), Err(Error::Argument(_))));
        assert!(matches!(parse(&line("-loop 5")), Err(Error::Argument(_))));
        assert!(matches!(
            parse(&line("-loop --loop 2 -dup")),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn rejects_unknown_and_stray_tokens() {
        assert!(matches!(parse(&line("-scale 2")), Err(Error::Argument(_))));
        assert!(matches!(parse(&line("5678")), Err(Error::Argument(_))));
    }

    #[test]
    fn every_operation_has_help() {
        for (name, help) in OPERATIONS {
            assert!(help.starts_with(name), "{name}");
        }
        assert_eq!(help_for("send"), Some(ferry::ops::SEND_HELP));
        assert_eq!(help_for("-receive"), Some(ferry::ops::RECEIVE_HELP));
        assert_eq!(help_for("scale"), None);
    }
}
