use std::{
    env,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    process,
};

// Host critical-section and time driver for the runtime's embassy types.
use critical_section as _;
use embassy_time as _;

use tsp_runtime::{
    config::{TouchConfig, GESTURE_MSG_LEN, MAX_FINGERS, RECORD_LEN},
    decoder::FrameDecoder,
    events::{InputEvent, InputSink, Key, ProximityEvent},
    gesture::{self, GestureMessage, GestureTelemetry},
    protocol::{classify, IrqMessage, RawRecord},
};

struct ReplayFrame {
    ms: u64,
    word: u32,
    payload: Vec<Vec<u8>>,
}

#[derive(Default)]
struct Collected {
    events: Vec<InputEvent>,
}

impl InputSink for Collected {
    fn emit(&mut self, event: InputEvent) {
        self.events.push(event);
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(usage());
    }

    let mut trace_path: Option<PathBuf> = None;
    let mut expect_path: Option<PathBuf> = None;
    let mut config = TouchConfig::default();

    let mut idx = 1usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--expect" => {
                idx += 1;
                let Some(path) = args.get(idx) else {
                    return Err("missing path after --expect".into());
                };
                expect_path = Some(PathBuf::from(path));
            }
            "--panel" => {
                idx += 1;
                let Some(size) = args.get(idx) else {
                    return Err("missing WxH after --panel".into());
                };
                let (width, height) = parse_panel(size)?;
                config = config.with_panel(width, height);
            }
            "-h" | "--help" => {
                println!("{}", usage());
                return Ok(());
            }
            value if value.starts_with('-') => {
                return Err(format!("unknown argument: {value}"));
            }
            value => {
                if trace_path.is_some() {
                    return Err("multiple trace paths provided".into());
                }
                trace_path = Some(PathBuf::from(value));
            }
        }
        idx += 1;
    }

    let trace_path = trace_path.ok_or_else(usage)?;
    let frames = parse_trace(&trace_path)?;

    let mut decoder = FrameDecoder::new();
    let telemetry = GestureTelemetry::new();
    let mut labels: Vec<String> = Vec::new();

    println!("event,ms,kind,slot,x,y");
    for frame in &frames {
        let mut sink = Collected::default();
        match classify(frame.word) {
            IrqMessage::Touch(header) => {
                let records = frame_records(frame, header.count as usize)?;
                decoder.decode(&config, &records, &mut sink);
            }
            IrqMessage::Gesture { command: 0 } => {
                let message = gesture_message(frame)?;
                match gesture::classify(&message) {
                    Ok(event) => gesture::dispatch(event, &telemetry, &mut sink),
                    Err(reject) => println!("status,{},gesture_dropped {:?}", frame.ms, reject),
                }
            }
            other => println!("status,{},{:?}", frame.ms, other),
        }

        for event in &sink.events {
            let (slot, x, y) = event_position(event);
            let label = kind_label(event);
            println!("event,{},{},{},{},{}", frame.ms, label, slot, x, y);
            labels.push(label);
        }
    }

    let table = decoder.table();
    println!(
        "summary,fingers={},multi={},pressed={}",
        table.all_finger_count, table.all_multi_finger_count, table.pressed
    );

    if let Some(expect_path) = expect_path {
        let expected = parse_expected_kinds(&expect_path)?;
        if labels != expected {
            eprintln!("expected kinds: {}", expected.join(","));
            eprintln!("actual kinds:   {}", labels.join(","));
            return Err("event sequence mismatch".into());
        }
    }

    Ok(())
}

fn usage() -> String {
    "usage: frame_replay <trace.csv> [--panel WxH] [--expect expected_kinds.txt]".to_string()
}

fn frame_records(frame: &ReplayFrame, count: usize) -> Result<Vec<RawRecord>, String> {
    if frame.payload.len() < count.min(MAX_FINGERS) {
        return Err(format!(
            "frame at {} ms reports {} records but carries {}",
            frame.ms,
            count,
            frame.payload.len()
        ));
    }
    frame
        .payload
        .iter()
        .take(count)
        .map(|bytes| {
            let record: [u8; RECORD_LEN] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| format!("frame at {} ms has a short record", frame.ms))?;
            Ok(RawRecord::parse(&record))
        })
        .collect()
}

fn gesture_message(frame: &ReplayFrame) -> Result<GestureMessage, String> {
    let bytes = frame
        .payload
        .first()
        .ok_or_else(|| format!("gesture at {} ms has no message", frame.ms))?;
    let block: [u8; GESTURE_MSG_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("gesture at {} ms has a short message", frame.ms))?;
    Ok(GestureMessage::parse(&block))
}

fn event_position(event: &InputEvent) -> (String, u16, u16) {
    match *event {
        InputEvent::Press { slot, contact } | InputEvent::Move { slot, contact } => {
            (slot.to_string(), contact.x, contact.y)
        }
        InputEvent::Release { slot } => (slot.to_string(), 0, 0),
        _ => (String::new(), 0, 0),
    }
}

fn kind_label(event: &InputEvent) -> String {
    match *event {
        InputEvent::Press { .. } => "press".into(),
        InputEvent::Move { .. } => "move".into(),
        InputEvent::Release { .. } => "release".into(),
        InputEvent::KeyDown(key) => format!("key_down:{}", key_label(key)),
        InputEvent::KeyUp(key) => format!("key_up:{}", key_label(key)),
        InputEvent::Proximity(ProximityEvent::Hover(level)) => format!("hover:{level}"),
        InputEvent::Proximity(ProximityEvent::Pocket(on)) => format!("pocket:{on}"),
        InputEvent::Proximity(ProximityEvent::WakePulse(on)) => format!("wake_pulse:{on}"),
    }
}

fn key_label(key: Key) -> &'static str {
    match key {
        Key::Touch => "touch",
        Key::Gesture => "gesture",
        Key::Wakeup => "wakeup",
        Key::InterruptCancel => "interrupt_cancel",
    }
}

fn parse_trace(path: &Path) -> Result<Vec<ReplayFrame>, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out: Vec<ReplayFrame> = Vec::new();
    for (line_no, line_result) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line_result
            .map_err(|e| format!("failed to read {}:{}: {e}", path.display(), line_no))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts[0] != "irq" {
            continue;
        }
        if parts.len() < 3 {
            return Err(format!(
                "{}:{} invalid trace line, expected irq,ms,word[,payload...]",
                path.display(),
                line_no
            ));
        }

        let ms = parts[1].parse::<u64>().map_err(|e| {
            format!("{}:{} invalid ms '{}': {e}", path.display(), line_no, parts[1])
        })?;
        let word = u32::from_str_radix(parts[2].trim_start_matches("0x"), 16).map_err(|e| {
            format!("{}:{} invalid word '{}': {e}", path.display(), line_no, parts[2])
        })?;
        let payload = parts[3..]
            .iter()
            .map(|hex| parse_hex_bytes(hex).map_err(|e| format!("{}:{} {e}", path.display(), line_no)))
            .collect::<Result<Vec<_>, _>>()?;

        out.push(ReplayFrame { ms, word, payload });
    }

    Ok(out)
}

fn parse_hex_bytes(hex: &str) -> Result<Vec<u8>, String> {
    if !hex.is_ascii() {
        return Err(format!("non-ascii hex '{hex}'"));
    }
    if hex.len() % 2 != 0 {
        return Err(format!("odd-length hex '{hex}'"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|at| {
            u8::from_str_radix(&hex[at..at + 2], 16).map_err(|e| format!("invalid hex '{hex}': {e}"))
        })
        .collect()
}

fn parse_panel(raw: &str) -> Result<(u16, u16), String> {
    let (width, height) = raw
        .split_once('x')
        .ok_or_else(|| format!("invalid panel size '{raw}', expected WxH"))?;
    let width = width
        .parse::<u16>()
        .map_err(|e| format!("invalid panel width '{width}': {e}"))?;
    let height = height
        .parse::<u16>()
        .map_err(|e| format!("invalid panel height '{height}': {e}"))?;
    Ok((width, height))
}

fn parse_expected_kinds(path: &Path) -> Result<Vec<String>, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let reader = BufReader::new(file);

    let mut kinds = Vec::new();
    for line_result in reader.lines() {
        let line = line_result.map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        kinds.push(token.to_ascii_lowercase());
    }

    Ok(kinds)
}
