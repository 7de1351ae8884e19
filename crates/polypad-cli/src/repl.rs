//! Minimal interactive front end. The source hardware drove these actions
//! from four physical buttons; on a development machine stdin does the job.

use std::io::{self, BufRead, Write};

use polypad_bank::note_from_stem;
use polypad_engine::ControlHandle;

const HELP: &str = "\
commands:
  play <note> [velocity]   trigger a note (number or name, e.g. 60 or c4)
  stop <note>              release a note
  vol <0..1>               set master volume
  preset <id>              load a preset by name or slot
  next | prev              step through presets
  status                   engine snapshot
  quit                     exit";

/// Reads commands from stdin until `quit` or EOF.
pub fn run(control: &ControlHandle) -> anyhow::Result<()> {
    println!("{HELP}");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else { continue };
        let result = match verb {
            "play" => play(control, parts.next(), parts.next()),
            "stop" => stop(control, parts.next()),
            "vol" => volume(control, parts.next()),
            "preset" => preset(control, parts.next()),
            "next" => step_preset(control, 1),
            "prev" => step_preset(control, -1),
            "status" => {
                print_status(control);
                Ok(())
            }
            "help" => {
                println!("{HELP}");
                Ok(())
            }
            "quit" | "exit" => return Ok(()),
            other => {
                println!("unknown command '{other}' (try 'help')");
                Ok(())
            }
        };
        if let Err(message) = result {
            println!("{message}");
        }
    }
}

fn parse_note(text: Option<&str>) -> Result<u8, String> {
    let text = text.ok_or("expected a note")?;
    note_from_stem(text).ok_or_else(|| format!("'{text}' is not a note"))
}

fn play(control: &ControlHandle, note: Option<&str>, velocity: Option<&str>) -> Result<(), String> {
    let note = parse_note(note)?;
    let velocity = match velocity {
        Some(text) => text
            .parse::<u8>()
            .ok()
            .filter(|v| *v <= 127)
            .ok_or_else(|| format!("'{text}' is not a velocity (0-127)"))?,
        None => 100,
    };
    control
        .note_on(note, velocity)
        .map_err(|err| err.to_string())
}

fn stop(control: &ControlHandle, note: Option<&str>) -> Result<(), String> {
    let note = parse_note(note)?;
    control.note_off(note).map_err(|err| err.to_string())
}

fn volume(control: &ControlHandle, value: Option<&str>) -> Result<(), String> {
    let value = value
        .and_then(|text| text.parse::<f32>().ok())
        .ok_or("expected a volume between 0 and 1")?;
    control.set_volume(value);
    Ok(())
}

fn preset(control: &ControlHandle, id: Option<&str>) -> Result<(), String> {
    let id = id.ok_or("expected a preset id")?;
    let slot = control.load_preset(id).map_err(|err| err.to_string())?;
    println!("preset {slot} loading");
    Ok(())
}

fn step_preset(control: &ControlHandle, direction: i64) -> Result<(), String> {
    let count = control.presets().len() as i64;
    if count == 0 {
        return Err("no presets loaded".into());
    }
    let current = control
        .levels()
        .preset_slot()
        .map(|slot| slot as i64)
        .unwrap_or(0);
    let next = (current + direction).rem_euclid(count);
    control
        .load_preset_slot(next as u32)
        .map_err(|err| err.to_string())?;
    println!("preset {next} loading");
    Ok(())
}

fn print_status(control: &ControlHandle) {
    let snapshot = control.levels().snapshot();
    let preset = snapshot
        .preset_slot
        .and_then(|slot| control.presets().get(slot))
        .map(|preset| format!("{} (slot {})", preset.bank.name(), preset.slot))
        .unwrap_or_else(|| "none".to_string());
    println!(
        "preset: {preset}  voices: {}  volume: {:.2}  faults: {}  xruns: {}",
        snapshot.active_voices, snapshot.master_gain, snapshot.faults, snapshot.xruns
    );
    if snapshot.stream_failed {
        println!("output stream reported a fatal error; restart to recover audio");
    }
}
