/// A stand-in for a Python interpreter with `truthbrush` installed, used by end-to-end tests.
///
/// Understands only the two programs the bridge runs (`-c PROBE_SCRIPT` and `-c BRIDGE_SCRIPT`)
/// and answers the bridge based on the password it receives:
///
/// - `correct-horse` → token `token-for-<username>`
/// - `network-down` → `failed` reply
/// - `crash` → exits non-zero with a traceback, without replying
/// - anything else → `login_rejected` reply
///
/// If `MOCK_TRUTHBRUSH_MISSING` is set every program fails with `ModuleNotFoundError`.
/// If `MOCK_PYTHON_LOG` is set, the kind of each program run is appended to that file.
use serde_json::{Value, json};
use std::{
    env,
    fs::OpenOptions,
    io::{Write, stdin},
    process,
};
use truthsocial_token::bridge::{BRIDGE_SCRIPT, PROBE_SCRIPT};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let [flag, program] = args.as_slice() else {
        eprintln!("usage: mock_python -c <program>");
        process::exit(2);
    };
    assert_eq!(flag, "-c", "Only `-c` is supported");

    let kind = match program.as_str() {
        PROBE_SCRIPT => "probe",
        BRIDGE_SCRIPT => "bridge",
        _ => {
            eprintln!("mock_python: unknown program");
            process::exit(2);
        }
    };

    if let Ok(path) = env::var("MOCK_PYTHON_LOG") {
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        writeln!(log, "{kind}").unwrap();
    }

    if env::var_os("MOCK_TRUTHBRUSH_MISSING").is_some() {
        eprintln!("Traceback (most recent call last):");
        eprintln!("  File \"<string>\", line 1, in <module>");
        eprintln!("ModuleNotFoundError: No module named 'truthbrush'");
        process::exit(1);
    }

    if kind == "probe" {
        return;
    }

    let request: Value = serde_json::from_reader(stdin()).unwrap();
    let username = request["login"]["username"].as_str().unwrap();
    let password = request["login"]["password"].as_str().unwrap();
    assert_eq!(request["session"], request["login"]);

    let reply = match password {
        "correct-horse" => json!({"status": "ok", "token": format!("token-for-{username}")}),
        "network-down" => json!({"status": "failed", "message": "Connection reset by peer"}),
        "crash" => {
            eprintln!("Traceback (most recent call last):");
            eprintln!("RuntimeError: interpreter crashed");
            process::exit(1);
        }
        _ => json!({"status": "login_rejected", "message": "Login failed: invalid credentials"}),
    };

    print!("{reply}");
}
