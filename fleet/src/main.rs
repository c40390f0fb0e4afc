use std::io::{self, BufRead};
use std::process;
use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shared_resources::config::FleetConfig;

use fleet::command::Command;
use fleet::controller::FleetController;
use fleet::display;

fn main() {
    // INITIALIZE LOGGING (stderr, the status table owns stdout)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    // READ CONFIGURATION
    let config = FleetConfig::get();
    let controller = match FleetController::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    // INITIALIZE CHANNELS
    // dropping stop_tx stops every worker
    let (stop_tx, stop_rx) = unbounded::<()>();
    let commands_rx = read_commands();
    let events_rx = controller.subscribe();

    thread::scope(|scope| {
        // INITIALIZE THREAD FOR THE SIMULATION CLOCK
        let simulation_stop = stop_rx.clone();
        let controller = &controller;
        let spawned = thread::Builder::new()
            .name(String::from("simulation"))
            .spawn_scoped(scope, move || controller.run(simulation_stop));
        if let Err(e) = spawned {
            error!("could not start the simulation: {}", e);
            process::exit(1);
        }

        // INITIALIZE THREAD FOR THE STATUS DISPLAY
        let display_stop = stop_rx.clone();
        let spawned = thread::Builder::new().name(String::from("display")).spawn_scoped(scope, move || {
            if let Err(e) = display::run(controller, events_rx, display_stop) {
                error!("status display failed: {}", e);
            }
        });
        if let Err(e) = spawned {
            warn!("running without a status display: {}", e);
        }

        // OPERATOR CONSOLE
        for line in commands_rx {
            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };
            match command {
                Command::Quit => break,
                Command::Status => match display::status_json(controller) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("could not dump status: {}", e),
                },
                command => match command.execute(controller) {
                    Ok(Some(id)) => info!(request = %id, "{:?} accepted", command),
                    Ok(None) => info!("{:?} done", command),
                    Err(e) => warn!("{}", e),
                },
            }
        }
        drop(stop_tx);
    });
    info!("fleet shut down");
}

/// Forwards stdin lines. The channel closes at end of input.
fn read_commands() -> Receiver<String> {
    let (commands_tx, commands_rx) = unbounded();
    let spawned = thread::Builder::new().name(String::from("console")).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            if commands_tx.send(line).is_err() {
                break;
            }
        }
    });
    if let Err(e) = spawned {
        error!("could not read the console: {}", e);
        process::exit(1);
    }
    commands_rx
}
