//! Sandbox integration tests.
//!
//! Scripts go through the full pipeline: validation, interpretation and
//! output checks.

use vibecraft_core::config::SandboxLimits;
use vibecraft_core::Error;
use vibecraft_sandbox::validate::{
    BLOCKED_ATTRIBUTES, BLOCKED_FUNCTION_NAMES, FORBIDDEN_SUBSTRINGS,
};
use vibecraft_sandbox::{execute_command_generator, CodeSandbox};

// =============================================================================
// Helpers
// =============================================================================

fn run(source: &str) -> vibecraft_core::Result<Vec<String>> {
    execute_command_generator(source, &SandboxLimits::default())
}

fn validation_message(source: &str) -> String {
    match run(source) {
        Err(Error::SandboxValidation(message)) => message,
        other => panic!("expected validation error, got {:?}", other),
    }
}

fn execution_message(source: &str) -> String {
    match run(source) {
        Err(Error::SandboxExecution(message)) => message,
        other => panic!("expected execution error, got {:?}", other),
    }
}

// =============================================================================
// 1. Generating commands
// =============================================================================

#[test]
fn test_simple_loop() {
    let source = "\
commands = []
for x in range(100, 110):
    commands.append(f\"/setblock {x} 64 200 stone\")
";
    let commands = run(source).unwrap();
    assert_eq!(commands.len(), 10);
    assert_eq!(commands[0], "/setblock 100 64 200 stone");
    assert_eq!(commands[9], "/setblock 109 64 200 stone");
}

#[test]
fn test_sphere_with_math() {
    let source = "\
commands = []
for x in range(100, 110):
    for y in range(64, 74):
        for z in range(200, 210):
            distance = sqrt((x-105)**2 + (y-69)**2 + (z-205)**2)
            if distance < 5:
                commands.append(f\"/setblock {x} {y} {z} red_concrete\")
";
    let commands = run(source).unwrap();
    assert!(!commands.is_empty());
    assert!(commands.contains(&"/setblock 105 69 205 red_concrete".to_string()));
    assert!(!commands.contains(&"/setblock 100 64 200 red_concrete".to_string()));
}

#[test]
fn test_prebound_commands_list() {
    let commands = run("commands.append('/time set day')").unwrap();
    assert_eq!(commands, vec!["/time set day"]);
}

#[test]
fn test_comprehension_and_helpers() {
    let source = "\
blocks = ['stone', 'oak_planks', 'glass']
pairs = [(i, b) for i, b in enumerate(blocks) if b != 'glass']
commands = ['/setblock {} 70 {} {}'.format(i, round(cos(0) * i), b.upper().lower()) for i, b in pairs]
commands += ['/fill %d 0 0 %d 3 0 %s' % (0, len(blocks), max(blocks))]
";
    let commands = run(source).unwrap();
    assert_eq!(
        commands,
        vec![
            "/setblock 0 70 0 stone",
            "/setblock 1 70 1 oak_planks",
            "/fill 0 0 0 3 3 0 stone",
        ]
    );
}

#[test]
fn test_format_specs_in_fstrings() {
    let source = "\
r = 2.5
commands = [f'/say {r:.3f} {r!r} {42:05d} {7:x} {0.25:%}']
";
    assert_eq!(run(source).unwrap(), vec!["/say 2.500 2.5 00042 7 25.000000%"]);
}

#[tokio::test]
async fn test_async_run_uses_blocking_pool() {
    let sandbox = CodeSandbox::new(SandboxLimits::default());
    let commands = sandbox
        .run("commands = ['/weather clear']".to_string())
        .await
        .unwrap();
    assert_eq!(commands, vec!["/weather clear"]);
}

// =============================================================================
// 2. Validation
// =============================================================================

#[test]
fn test_each_forbidden_substring_is_rejected() {
    for pattern in FORBIDDEN_SUBSTRINGS {
        let source = format!("commands = []\nx = {}", pattern);
        assert_eq!(
            validation_message(&source),
            format!("Forbidden pattern detected in code: '{}'", pattern)
        );
    }
}

#[test]
fn test_escape_attempts_are_blocked() {
    let cases = [
        ("commands = []\nimport os", "Unsafe operation: Import"),
        ("commands = []\ndef foo(): pass", "Unsafe operation: FunctionDef"),
        ("commands = []\nf = lambda x: x", "Unsafe operation: Lambda"),
        ("commands = []\n__name__", "Dunder variable access not allowed"),
        ("commands = []\ntry:\n    x = 1\nexcept:\n    x = 2", "Unsafe operation: Try"),
        ("commands = []\nx = type(1)", "Blocked function call: type()"),
        ("commands = []\nx = [c for c in 'ab'].__init__", "Blocked attribute access"),
    ];
    for (source, expected) in cases {
        let message = validation_message(source);
        assert!(
            message.starts_with(expected),
            "{:?} produced {:?}",
            source,
            message
        );
    }
}

#[test]
fn test_every_blocked_attribute_is_rejected() {
    for attr in BLOCKED_ATTRIBUTES {
        for access in [format!("x = [].{}", attr), format!("x = {{}}['{}']", attr)] {
            let source = format!("commands = []\n{}", access);
            assert!(
                matches!(run(&source), Err(Error::SandboxValidation(_))),
                "{:?} was not rejected",
                access
            );
        }
    }
}

#[test]
fn test_every_blocked_name_is_rejected() {
    for name in BLOCKED_FUNCTION_NAMES {
        for usage in [format!("x = {}()", name), format!("x = {}", name)] {
            let source = format!("commands = []\n{}", usage);
            assert!(
                matches!(run(&source), Err(Error::SandboxValidation(_))),
                "{:?} was not rejected",
                usage
            );
        }
    }
}

#[test]
fn test_static_iteration_estimate() {
    assert_eq!(
        validation_message("commands = []\nfor i in range(1000000): pass"),
        "Unsafe operation: Pass is not allowed. Only basic loops, math, and list operations are permitted."
    );
    assert_eq!(
        validation_message(
            "commands = []\nfor i in range(1000):\n    for j in range(1000):\n        x = i"
        ),
        "Code may execute too many iterations (1,000,000 > 100,000). Please reduce loop sizes."
    );
}

// =============================================================================
// 3. Execution limits
// =============================================================================

#[test]
fn test_range_cap() {
    assert_eq!(
        execution_message("n = 20000\nfor i in range(n):\n    x = i"),
        "range stop value too large: 20000"
    );
    assert_eq!(
        execution_message("x = range(0, 5, 0)"),
        "range step cannot be zero"
    );
}

#[test]
fn test_huge_format_width_is_a_memory_error() {
    let sources = [
        "commands = []\nx = f\"{1:1000000000000}\"\n",
        "commands = []\nx = '{:>99999999}'.format('a')\n",
        "commands = []\nx = '%1000000000000d' % 5\n",
        "commands = []\nx = f'{2.5:.50000000f}'\n",
    ];
    for source in sources {
        let message = execution_message(source);
        assert!(
            message.starts_with("Code execution failed: MemoryError:"),
            "{:?} produced {:?}",
            source,
            message
        );
    }
    assert_eq!(
        run("commands = [f'/say {7:>4}|']").unwrap(),
        vec!["/say    7|"]
    );
}

#[test]
fn test_runtime_iteration_budget() {
    let limits = SandboxLimits {
        max_iterations: 1000,
        ..SandboxLimits::default()
    };
    let source = "n = 100\nfor i in range(n):\n    for j in range(n):\n        x = i";
    let err = execute_command_generator(source, &limits).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Sandbox execution failed: Code exceeded the limit of 1,000 loop iterations"
    );
}

#[test]
fn test_wall_clock_timeout() {
    let limits = SandboxLimits {
        timeout_secs: 1,
        max_iterations: u64::MAX,
        ..SandboxLimits::default()
    };
    let source = "\
commands = []
n = 10000
for a in range(n):
    for b in range(n):
        x = a * b
";
    let err = execute_command_generator(source, &limits).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Sandbox execution failed: Code execution timed out after 1 seconds"
    );
}

#[test]
fn test_exception_message_is_wrapped() {
    assert_eq!(
        execution_message("commands = []\nx = 1 / 0"),
        "Code execution failed: ZeroDivisionError: division by zero"
    );
    assert_eq!(
        execution_message("commands = []\nx = [1][5]"),
        "Code execution failed: IndexError: list index out of range"
    );
    assert_eq!(
        execution_message("commands = []\nx = 'a' + 1"),
        "Code execution failed: TypeError: can only concatenate str (not \"int\") to str"
    );
}

// =============================================================================
// 4. Output checks
// =============================================================================

#[test]
fn test_command_count_limit() {
    let limits = SandboxLimits {
        max_commands: 5,
        ..SandboxLimits::default()
    };
    let at_limit = "commands = ['/say hi'] * 5";
    assert_eq!(execute_command_generator(at_limit, &limits).unwrap().len(), 5);

    let over = "commands = ['/say hi'] * 6";
    let err = execute_command_generator(over, &limits).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Sandbox execution failed: Too many commands generated: 6 > 5. Please reduce the scope."
    );
}

#[test]
fn test_output_shape_errors() {
    assert_eq!(
        execution_message("commands = 'oops'"),
        "Code must create a 'commands' list. Got str instead."
    );
    assert_eq!(
        execution_message("commands = ['/say a', 5]"),
        "Command 1 is not a string: int. All commands must be strings."
    );
    assert_eq!(
        execution_message("commands = ['say a']"),
        "Command 0 doesn't start with '/': say a..."
    );
    assert_eq!(
        execution_message("commands = ['/' + 'a' * 1000]"),
        "Command 0 too long: 1001 chars > 1000 max"
    );
}

#[test]
fn test_blocked_command_patterns() {
    assert_eq!(
        execution_message("commands = ['/stop']"),
        "Command 0 contains blocked pattern 'stop': /stop..."
    );
    assert_eq!(
        execution_message("commands = ['/setblock 0 0 0 stone', '/BAN player']"),
        "Command 1 contains blocked pattern 'ban': /BAN player..."
    );
    assert_eq!(
        execution_message("commands = ['/op Steve']"),
        "Command 0 contains blocked pattern 'op ': /op Steve..."
    );
}
