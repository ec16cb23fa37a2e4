use exam_relay::command::Command;

fn only_sol_c(path: &str) -> bool {
    path == "sol.c"
}

#[test]
fn test_number_then_file_submits() {
    assert_eq!(
        Command::parse_with("3 sol.c", only_sol_c),
        Command::Submit {
            problem: Some(3),
            file: "sol.c".to_string()
        }
    );
}

#[test]
fn test_file_then_number_is_identical() {
    assert_eq!(
        Command::parse_with("sol.c 3", only_sol_c),
        Command::parse_with("3 sol.c", only_sol_c)
    );
}

#[test]
fn test_flag_form_submits() {
    assert_eq!(
        Command::parse_with("-p 2 -f sol.c", only_sol_c),
        Command::Submit {
            problem: Some(2),
            file: "sol.c".to_string()
        }
    );
    assert_eq!(
        Command::parse_with("--file sol.c --problem 4", only_sol_c),
        Command::Submit {
            problem: Some(4),
            file: "sol.c".to_string()
        }
    );
}

#[test]
fn test_file_alone_has_no_problem() {
    assert_eq!(
        Command::parse_with("sol.c", only_sol_c),
        Command::Submit {
            problem: None,
            file: "sol.c".to_string()
        }
    );
}

#[test]
fn test_number_alone_views_message() {
    assert_eq!(Command::parse_with("99", only_sol_c), Command::ViewMessage(99));
    assert_eq!(Command::parse_with("-p 7", only_sol_c), Command::ViewMessage(7));
}

#[test]
fn test_empty_line_refreshes() {
    assert_eq!(Command::parse_with("", only_sol_c), Command::Refresh);
    assert_eq!(Command::parse_with("   ", only_sol_c), Command::Refresh);
}

#[test]
fn test_keywords() {
    assert_eq!(Command::parse_with("help", only_sol_c), Command::Help);
    assert_eq!(Command::parse_with("LOGOUT", only_sol_c), Command::Logout);
    assert_eq!(
        Command::parse_with("os ls -l | head", only_sol_c),
        Command::Os("ls -l | head".to_string())
    );
    assert_eq!(
        Command::parse_with("bg 3 sol.c", only_sol_c),
        Command::Background("3 sol.c".to_string())
    );
}

#[test]
fn test_keyword_needs_word_boundary() {
    // "ostrich.c" is a file, not "os trich.c"
    let exists = |p: &str| p == "ostrich.c";
    assert_eq!(
        Command::parse_with("ostrich.c", exists),
        Command::Submit {
            problem: None,
            file: "ostrich.c".to_string()
        }
    );
}

#[test]
fn test_invalid_shapes() {
    for line in [
        "missing.c",
        "1 2",
        "sol.c sol.c",
        "1 sol.c extra",
        "-x 1",
        "os",
        "help me",
    ] {
        assert!(
            matches!(Command::parse_with(line, only_sol_c), Command::Invalid(_)),
            "{} should be invalid",
            line
        );
    }
}

#[test]
fn test_negative_number_is_a_problem_number() {
    assert_eq!(Command::parse_with("-1", only_sol_c), Command::ViewMessage(-1));
}
