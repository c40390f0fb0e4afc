use std::collections::VecDeque;
use std::io::{stdout, Stdout, Write};
use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver};
use crossterm::{cursor, terminal, ExecutableCommand, Result};

use shared_resources::event::FleetEvent;
use shared_resources::request::{CarId, Request};

use car::view::CarStatus;

use crate::controller::FleetController;

const RECENT_EVENTS: usize = 6;
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

/// Redraws the fleet status table on stdout after every batch of
/// notifications and on a timer, until `stop` fires.
pub fn run(controller: &FleetController, events: Receiver<FleetEvent>, stop: Receiver<()>) -> Result<()> {
    let mut stdout = stdout();
    let mut recent: VecDeque<String> = VecDeque::with_capacity(RECENT_EVENTS);
    let mut height = 0;
    let redraw = tick(REDRAW_INTERVAL);

    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(event) => {
                    remember(&mut recent, &event);
                    for event in events.try_iter() {
                        remember(&mut recent, &event);
                    }
                    height = print_status(&mut stdout, controller, &recent)?;
                }
                Err(_) => return leave(&mut stdout, height),
            },
            recv(redraw) -> _ => {
                height = print_status(&mut stdout, controller, &recent)?;
            },
            recv(stop) -> _ => return leave(&mut stdout, height),
        }
    }
}

/// Moves the cursor below the last table drawn.
fn leave(stdout: &mut Stdout, height: u16) -> Result<()> {
    if height > 0 {
        stdout.execute(cursor::MoveDown(height))?;
    }
    Ok(())
}

fn remember(recent: &mut VecDeque<String>, event: &FleetEvent) {
    if recent.len() == RECENT_EVENTS {
        recent.pop_front();
    }
    recent.push_back(describe(event));
}

fn print_status(stdout: &mut Stdout, controller: &FleetController, recent: &VecDeque<String>) -> Result<u16> {
    let statuses: Vec<(CarId, Option<CarStatus>)> = controller
        .car_ids()
        .map(|id| (id, controller.car_status(id).ok()))
        .collect();
    let lines = render(
        &statuses,
        &controller.pending_requests(),
        recent,
        controller.strategy_name(),
        controller.now(),
    );

    stdout.execute(terminal::Clear(terminal::ClearType::FromCursorDown))?;
    for line in &lines {
        writeln!(stdout, "{}", line)?;
    }
    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    stdout.execute(cursor::MoveUp(height))?;
    Ok(height)
}

pub fn render(
    statuses: &[(CarId, Option<CarStatus>)],
    pending: &[Request],
    recent: &VecDeque<String>,
    strategy: &str,
    now: Duration,
) -> Vec<String> {
    let separator = "+--------+------------+------------+--------------+------------+--------+-------+";
    let mut lines = Vec::new();
    lines.push(format!("FLEET  t={:>8.1}s  strategy={:<16} pending={}", now.as_secs_f64(), strategy, pending.len()));
    lines.push(separator.to_string());
    lines.push(format!(
        "| {0:<6} | {1:<10} | {2:<10} | {3:<12} | {4:<10} | {5:<6} | {6:<5} |",
        "CAR", "FLOOR", "DIRECTION", "STATE", "DOORS", "LOAD", "QUEUE"
    ));
    lines.push(separator.to_string());
    for (id, status) in statuses {
        match status {
            Some(status) => {
                let view = &status.view;
                let state = if view.maintenance && !view.motion_state.is_out_of_service() {
                    format!("{}*", view.motion_state.as_string())
                } else {
                    view.motion_state.as_string()
                };
                lines.push(format!(
                    "| {0:<6} | {1:<10.2} | {2:<10} | {3:<12} | {4:<10} | {5:>6} | {6:>5} |",
                    id.to_string(),
                    view.floor,
                    view.direction.as_string(),
                    state,
                    view.door_state.as_string(),
                    format!("{}/{}", view.load, view.capacity),
                    view.queue_depth
                ));
                let stops: Vec<String> = status.queue.iter().map(|entry| entry.target.to_string()).collect();
                if !stops.is_empty() {
                    lines.push(format!("|        | stops: {:<69}|", stops.join(" ")));
                }
            }
            None => lines.push(format!("| {0:<6} | {1:<68} |", id.to_string(), "UNAVAILABLE")),
        }
    }
    lines.push(separator.to_string());
    if !pending.is_empty() {
        let held: Vec<String> = pending
            .iter()
            .map(|request| format!("{}@{} ({})", request.id, request.origin_floor, request.call().as_string()))
            .collect();
        lines.push(format!("waiting for a car: {}", held.join(" ")));
    }
    for entry in recent {
        lines.push(format!("  {}", entry));
    }
    lines
}

#[derive(serde::Serialize, Debug)]
pub struct FleetStatus {
    pub time: f64,
    pub strategy: String,
    pub cars: Vec<CarStatus>,
    pub pending: Vec<Request>,
}

/// The whole fleet as one JSON document. Broken cars are left out.
pub fn status_json(controller: &FleetController) -> serde_json::Result<String> {
    let status = FleetStatus {
        time: controller.now().as_secs_f64(),
        strategy: controller.strategy_name().to_string(),
        cars: controller.car_ids().filter_map(|id| controller.car_status(id).ok()).collect(),
        pending: controller.pending_requests(),
    };
    serde_json::to_string_pretty(&status)
}

pub fn describe(event: &FleetEvent) -> String {
    match event {
        FleetEvent::CarStateChanged { car_id, old_state, new_state, floor, .. } => format!(
            "{} {} -> {} at {:.1}",
            car_id,
            old_state.as_string(),
            new_state.as_string(),
            floor
        ),
        FleetEvent::DoorStateChanged { car_id, new_state, floor, .. } => {
            format!("{} doors {} at {:.1}", car_id, new_state.as_string(), floor)
        }
        FleetEvent::RequestServed { request_id, car_id, floor } => {
            format!("{} served {} at floor {}", car_id, request_id, floor)
        }
        FleetEvent::RequestDiscarded { request_id, car_id } => format!("{} discarded {}", car_id, request_id),
        FleetEvent::BoardingRefused { request_id, car_id, floor } => {
            format!("{} full, {} left waiting at floor {}", car_id, request_id, floor)
        }
        FleetEvent::NoCarAvailable { request_id } => format!("no elevator available for {}", request_id),
        FleetEvent::RequestMerged { request_id, merged_into, car_id } => {
            format!("{} joins {} on {}", request_id, merged_into, car_id)
        }
    }
}
