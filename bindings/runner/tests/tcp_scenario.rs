use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use gale_net_runner::prelude::*;
use pretty_assertions::assert_eq;

fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    serve_echo(listener);

    addr
}

/// Replies `Hello, you said: <message>` to each message, one thread per connection.
fn serve_echo(listener: TcpListener) {
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                continue;
            };
            std::thread::spawn(move || {
                let mut buf = [0u8; 1024];
                loop {
                    let n = match stream.read(&mut buf) {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    let reply = format!(
                        "Hello, you said: {}",
                        String::from_utf8_lossy(&buf[..n]).trim_end()
                    );
                    if stream.write_all(reply.as_bytes()).is_err() {
                        return;
                    }
                }
            });
        }
    });
}

fn cli(target: String, virtual_users: usize, iterations: u64) -> GaleScenarioCli {
    GaleScenarioCli {
        target: Some(target),
        virtual_users: Some(virtual_users),
        duration: Some(30),
        iterations: Some(iterations),
        pacing_ms: None,
        io_timeout_ms: 5_000,
        tls_min: None,
        tls_max: None,
        tls_cipher_suites: vec![],
        insecure_skip_tls_verify: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        run_id: None,
    }
}

/// The `tcp_echo` behaviour: the write opens the connection and the iteration closes it.
fn say_hello(ctx: &mut AgentContext<NetRunnerContext, NetAgentContext>) -> HookResult {
    tcp_write_line(ctx, "Say Hello")?;
    let reply = tcp_read_up_to(ctx, 1024)?;
    ctx.check(&reply[..], "verify ag tag", |r| {
        String::from_utf8_lossy(r).contains("Hello")
    });
    close_tcp(ctx);

    Ok(())
}

#[test]
fn tcp_echo_scenario_passes_checks_and_closes_connections() {
    let addr = start_echo_server();

    let scenario = ScenarioDefinitionBuilder::<NetRunnerContext, NetAgentContext>::new(
        "tcp_echo_test",
        cli(addr.to_string(), 4, 5),
    )
    .use_setup(configure_net_client)
    .use_agent_behaviour(say_hello)
    .use_agent_teardown(teardown_tcp);

    let summary = run(scenario).unwrap();

    assert_eq!(20, summary.iterations);
    assert_eq!(
        CheckCounts {
            passed: 20,
            failed: 0
        },
        summary.checks["verify ag tag"]
    );
    assert_eq!(20, summary.connections_opened);
    assert_eq!(0, summary.open_connections());
    assert!(summary.failed_iterations.is_empty());
}

#[test]
fn unreachable_target_fails_iterations_without_failing_the_run() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let scenario = ScenarioDefinitionBuilder::<NetRunnerContext, NetAgentContext>::new(
        "unreachable_target_test",
        cli(addr.to_string(), 2, 3),
    )
    .use_setup(configure_net_client)
    .use_agent_behaviour(say_hello)
    .use_agent_teardown(teardown_tcp);

    let summary = run(scenario).unwrap();

    assert_eq!(6, summary.iterations);
    assert_eq!(Some(&6), summary.failed_iterations.get("connect"));
    assert!(summary.checks.is_empty());
    assert_eq!(0, summary.open_connections());
}

#[test]
fn virtual_users_recover_once_the_target_comes_up() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(500));
        serve_echo(TcpListener::bind(addr).unwrap());
    });

    let scenario = ScenarioDefinitionBuilder::<NetRunnerContext, NetAgentContext>::new(
        "late_target_test",
        GaleScenarioCli {
            duration: Some(3),
            iterations: None,
            pacing_ms: Some(100),
            ..cli(addr.to_string(), 2, 0)
        },
    )
    .use_setup(configure_net_client)
    .use_agent_behaviour(say_hello)
    .use_agent_teardown(teardown_tcp);

    let summary = run(scenario).unwrap();

    assert!(summary.failed_iterations.get("connect").is_some_and(|n| *n > 0));
    let counts = summary.checks["verify ag tag"];
    assert!(counts.passed > 0);
    assert_eq!(0, counts.failed);
    assert_eq!(
        summary.iterations,
        counts.passed + summary.total_failed_iterations()
    );
    assert_eq!(2, summary.virtual_user_end_count);
    assert_eq!(0, summary.open_connections());
}

#[test]
fn write_reopens_a_closed_connection() {
    fn behaviour(ctx: &mut AgentContext<NetRunnerContext, NetAgentContext>) -> HookResult {
        // No explicit connect: the first write opens the connection and later iterations reuse it.
        tcp_write_line(ctx, "Say Hello")?;
        let reply = tcp_read_up_to(ctx, 1024)?;
        ctx.check(&reply[..], "verify ag tag", |r| !r.is_empty());

        if ctx.iteration() == 1 {
            close_tcp(ctx);
        }

        Ok(())
    }

    let addr = start_echo_server();
    let scenario = ScenarioDefinitionBuilder::<NetRunnerContext, NetAgentContext>::new(
        "reopen_test",
        cli(addr.to_string(), 1, 4),
    )
    .use_setup(configure_net_client)
    .use_agent_behaviour(behaviour)
    .use_agent_teardown(teardown_tcp);

    let summary = run(scenario).unwrap();

    assert_eq!(4, summary.checks["verify ag tag"].passed);
    assert_eq!(2, summary.connections_opened);
    assert_eq!(0, summary.open_connections());
}
