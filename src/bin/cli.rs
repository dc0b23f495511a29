use lazy_static::lazy_static;
use regex::Regex;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::num::ParseIntError;
use std::time::Instant;

use review_pipeline::config::Settings;
use review_pipeline::field::FieldKind;
use review_pipeline::preset::PresetStore;
use review_pipeline::saving::{load_pipeline, save_pipeline};
use review_pipeline::storage::FileStore;
use review_pipeline::timeline::TimelineUpdate;
use review_pipeline::{
    CellError, LoadError, Pipeline, PipelineError, PresetError, TimelineError, ValueError,
};

lazy_static! {
    static ref CELL_FIELD_RE: Regex =
        Regex::new(r"^(set|add|rm)\s+(\d+)\s+([A-Za-z][A-Za-z0-9_]*)(?:\s+(.+))?$").unwrap();
    static ref NOTE_RE: Regex = Regex::new(r"^note\s+(\d+)(?:\s+(.*))?$").unwrap();
    static ref VIEW_RE: Regex = Regex::new(r"^view\s+(\d+)$").unwrap();
    static ref COPY_RE: Regex = Regex::new(r"^copy\s+(\d+)\s+(\S+)\s+(\S+)$").unwrap();
    static ref PRESET_RE: Regex = Regex::new(r"^preset\s+(save|apply|rm|ls)(?:\s+(.*))?$").unwrap();
    static ref FILE_RE: Regex = Regex::new(r"^(export|import|save|load)\s+(.+)$").unwrap();
    static ref RANGE_RE: Regex = Regex::new(r"^(\d+)(?:-(\d+))?$").unwrap();
}

type CommandResult = Result<String, Box<dyn Error>>;

struct Session {
    settings: Settings,
    pipeline: Pipeline,
    presets: PresetStore,
}

fn main() -> Result<(), Box<dyn Error>> {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Usage: cli [culture|curing] [--store-dir DIR] [--verbose]");
            std::process::exit(2);
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(settings.log_filter()))
        .init();

    let pipeline = Pipeline::new(settings.pipeline)?;
    let store = FileStore::open(&settings.store_dir)?;
    let presets = PresetStore::open(settings.pipeline, Box::new(store), pipeline.catalog())?;
    let mut session = Session {
        settings,
        pipeline,
        presets,
    };

    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    loop {
        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!("[{elapsed_time:.1}] ({status}) > ");
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();

        if command == "q" {
            break;
        }
        if command.is_empty() {
            status = String::from("invalid command");
            continue;
        }
        status = match session.execute(command) {
            Ok(message) => message,
            Err(e) => describe(e.as_ref()),
        };
    }
    Ok(())
}

/// Short message for the status line. Technical text goes to the debug log;
/// cell numbers are shown 1-based, as they are typed.
fn describe(error: &(dyn Error + 'static)) -> String {
    log::debug!("command failed: {error}");
    if let Some(e) = error.downcast_ref::<PresetError>() {
        return e.user_message();
    }
    if let Some(e) = error.downcast_ref::<PipelineError>() {
        return match e {
            PipelineError::Preset(e) => e.user_message(),
            PipelineError::Cell(e) => cell_message(e),
            PipelineError::Timeline(e) => timeline_message(e),
        };
    }
    if let Some(e) = error.downcast_ref::<CellError>() {
        return cell_message(e);
    }
    if let Some(e) = error.downcast_ref::<ValueError>() {
        return value_message(e);
    }
    if let Some(e) = error.downcast_ref::<TimelineError>() {
        return timeline_message(e);
    }
    if let Some(e) = error.downcast_ref::<LoadError>() {
        return load_message(e);
    }
    if error.is::<io::Error>() {
        return "The file could not be read or written.".into();
    }
    if error.is::<chrono::ParseError>() {
        return "Dates are written as YYYY-MM-DD.".into();
    }
    if error.is::<ParseIntError>() {
        return "The duration must be a whole number.".into();
    }
    // messages raised by this binary are already worded for the user
    error.to_string()
}

fn cell_message(error: &CellError) -> String {
    match error {
        CellError::Timeline(e) => timeline_message(e),
        CellError::Value(e) => value_message(e),
    }
}

fn value_message(error: &ValueError) -> String {
    match error {
        ValueError::UnknownField(field) => {
            format!("There is no field called \"{field}\". Type `fields` to list them.")
        }
        ValueError::Computed(field) => format!("\"{field}\" is calculated and cannot be edited."),
        ValueError::WrongShape { field, expected } => format!("\"{field}\" needs {expected}."),
        ValueError::OutOfBounds { field, min, max, .. } => {
            format!("\"{field}\" must be between {min} and {max}.")
        }
        ValueError::UnknownOption { field, option } => {
            format!("\"{option}\" is not one of the choices for \"{field}\".")
        }
        ValueError::TooLong { field, max } => {
            format!("\"{field}\" is limited to {max} characters.")
        }
    }
}

fn timeline_message(error: &TimelineError) -> String {
    match error {
        TimelineError::CellOutOfRange { index, count } => format!(
            "Cell {} is outside the timeline, which has cells 1 to {count}.",
            index + 1
        ),
        TimelineError::UnsupportedInterval { pipeline, interval } => {
            format!("The {pipeline} pipeline cannot be laid out in {interval}.")
        }
        TimelineError::UnknownInterval(name) => {
            format!("\"{name}\" is not an interval. Use hours, days, weeks, months or phases.")
        }
        TimelineError::UnknownPipeline(name) => format!("\"{name}\" is not a pipeline type."),
        TimelineError::InvertedRange { .. } => {
            "The end date must not be before the start date.".into()
        }
        TimelineError::ZeroDuration => "The duration must be at least 1.".into(),
    }
}

fn load_message(error: &LoadError) -> String {
    match error {
        LoadError::Empty => "The file is empty.".into(),
        LoadError::MissingHeader => {
            "The file is not an export: its first line must start with Cell,Period.".into()
        }
        LoadError::UnknownColumn(label) => format!("Column \"{label}\" does not match any field."),
        LoadError::MalformedRow { row, reason } => format!("Row {row} could not be read: {reason}."),
        LoadError::PipelineMismatch { expected, found } => {
            format!("That file holds a {found} pipeline, not a {expected} one.")
        }
        LoadError::Cell(e) => cell_message(e),
        LoadError::Timeline(e) => timeline_message(e),
        LoadError::Io(_) => "The file could not be read.".into(),
        LoadError::Json(_) => "The file is not a saved pipeline.".into(),
    }
}

impl Session {
    fn execute(&mut self, command: &str) -> CommandResult {
        match command {
            "help" => {
                print_help();
                return Ok("ok".into());
            }
            "show" => {
                self.show()?;
                return Ok("ok".into());
            }
            "fields" => {
                self.list_fields();
                return Ok("ok".into());
            }
            "undo" => {
                return Ok(match self.pipeline.undo() {
                    Some(cells) => format!("undid change to cell(s) {}", one_based(&cells)),
                    None => "nothing to undo".into(),
                });
            }
            _ => {}
        }

        if let Some(rest) = command.strip_prefix("config") {
            return self.configure(rest);
        }
        if let Some(caps) = CELL_FIELD_RE.captures(command) {
            let index = cell_index(&caps[2])?;
            let field = &caps[3];
            return match (&caps[1], caps.get(4)) {
                ("set", Some(raw)) => {
                    let definition = self
                        .pipeline
                        .catalog()
                        .get_field(field)
                        .ok_or_else(|| format!("unknown field `{field}`"))?;
                    let value = definition.kind.decode(&definition.id, raw.as_str())?;
                    self.pipeline.set_value(index, field, Some(value))?;
                    Ok("ok".into())
                }
                ("add", None) => Ok(format!("{:?}", self.pipeline.add_catalog_entry(index, field)?)),
                ("rm", None) => {
                    self.pipeline.remove_entry(index, field)?;
                    Ok("ok".into())
                }
                _ => Ok("invalid command".into()),
            };
        }
        if let Some(caps) = NOTE_RE.captures(command) {
            let index = cell_index(&caps[1])?;
            let text = caps.get(2).map_or("", |m| m.as_str());
            self.pipeline.set_notes(index, text)?;
            return Ok("ok".into());
        }
        if let Some(caps) = VIEW_RE.captures(command) {
            self.view(cell_index(&caps[1])?)?;
            return Ok("ok".into());
        }
        if let Some(caps) = COPY_RE.captures(command) {
            let source = cell_index(&caps[1])?;
            let fields: Vec<&str> = caps[2].split(',').collect();
            let targets = parse_targets(&caps[3], self.pipeline.timeline().cell_count())?;
            let changed = self.pipeline.copy_fields(source, &fields, &targets)?;
            return Ok(format!("{changed} cell(s) updated"));
        }
        if let Some(caps) = PRESET_RE.captures(command) {
            let args: Vec<&str> = caps
                .get(2)
                .map_or(Vec::new(), |m| m.as_str().split_whitespace().collect());
            return self.preset(&caps[1], &args);
        }
        if let Some(caps) = FILE_RE.captures(command) {
            return self.file(&caps[1], caps[2].trim());
        }
        Ok("invalid command".into())
    }

    fn configure(&mut self, args: &str) -> CommandResult {
        let mut update = TimelineUpdate::new();
        for pair in args.split_whitespace() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got `{pair}`"))?;
            update = match (key, value) {
                ("interval", v) => update.interval(v.parse()?),
                ("start", v) => update.start(v.parse()?),
                ("end", v) => update.end(v.parse()?),
                ("dates", "none") => update.clear_dates(),
                ("duration", "none") => update.clear_duration(),
                ("duration", v) => update.duration(v.parse()?),
                _ => return Err(format!("unknown setting `{key}`").into()),
            };
        }
        let config = self.pipeline.configure(update)?;
        Ok(format!("{} x {}", config.total_cells, config.interval_type))
    }

    fn show(&self) -> Result<(), Box<dyn Error>> {
        let config = self.pipeline.timeline().config();
        println!(
            "{} pipeline: {} cell(s) of {}",
            self.settings.pipeline, config.total_cells, config.interval_type
        );
        for (index, content) in self.pipeline.cells().populated() {
            let label = self.pipeline.timeline().label_for(index)?;
            let entries: Vec<String> = content
                .entries()
                .map(|(id, value)| match value {
                    Some(v) => format!("{id}={}", v.render()),
                    None => format!("{id}=_"),
                })
                .collect();
            println!("  #{:<4} {:<18} {}", index + 1, label, entries.join(", "));
            if !content.notes().is_empty() {
                println!("         notes: {}", content.notes());
            }
        }
        Ok(())
    }

    fn list_fields(&self) {
        for section in self.pipeline.catalog().list_sections() {
            println!("{}", section.label);
            for field in &section.fields {
                let marker = match field.kind {
                    FieldKind::Computed(_) => " (computed)",
                    _ => "",
                };
                println!(
                    "  {:<24} {:<12} {}{}",
                    field.id,
                    field.kind.name(),
                    field.label,
                    marker
                );
            }
        }
    }

    fn view(&self, index: usize) -> Result<(), Box<dyn Error>> {
        let record = self.pipeline.view(index)?;
        println!("{}", self.pipeline.timeline().label_for(index)?);
        for (id, value) in record.iter() {
            let Some(field) = self.pipeline.catalog().get_field(id.as_str()) else {
                continue;
            };
            println!(
                "  {:<28} {} {}",
                field.label,
                value.render(),
                field.unit.unwrap_or("")
            );
        }
        Ok(())
    }

    fn preset(&mut self, action: &str, args: &[&str]) -> CommandResult {
        match (action, args) {
            ("save", [cell, group, name @ ..]) if !name.is_empty() => {
                let preset =
                    self.pipeline
                        .capture_preset(cell_index(cell)?, &name.join(" "), group, &[])?;
                let persisted = self.presets.save(preset)?;
                Ok(match persisted.warning {
                    None => "preset saved".into(),
                    Some(e) => {
                        log::warn!("{e}");
                        "preset saved for this session only".into()
                    }
                })
            }
            ("apply", [group, name @ .., targets]) if !name.is_empty() => {
                let name = name.join(" ");
                let preset = self
                    .presets
                    .find_by_name(group, &name)
                    .cloned()
                    .ok_or_else(|| format!("no preset \"{name}\" in \"{group}\""))?;
                let targets = parse_targets(targets, self.pipeline.timeline().cell_count())?;
                let changed = self.pipeline.apply_preset(&preset, &targets)?;
                Ok(format!("{changed} cell(s) updated"))
            }
            ("rm", [group, name @ ..]) if !name.is_empty() => {
                let name = name.join(" ");
                match self.presets.find_by_name(group, &name).map(|p| p.id) {
                    Some(id) => {
                        let persisted = self.presets.delete(id);
                        Ok(if persisted.is_clean() {
                            "preset deleted".into()
                        } else {
                            "preset deleted for this session only".into()
                        })
                    }
                    None => Ok("ok".into()),
                }
            }
            ("ls", [] | [_]) => {
                for preset in self.presets.list(args.first().copied()) {
                    println!(
                        "  [{}] {} ({} field(s))",
                        preset.group_id,
                        preset.name,
                        preset.fields.len()
                    );
                }
                Ok("ok".into())
            }
            _ => Ok("invalid command".into()),
        }
    }

    fn file(&mut self, action: &str, path: &str) -> CommandResult {
        match action {
            "export" => {
                fs::write(path, self.pipeline.export_csv()?)?;
                Ok(format!("exported to {path}"))
            }
            "import" => {
                let text = fs::read_to_string(path)?;
                let count = self.pipeline.import_csv(&text)?;
                Ok(format!("imported {count} cell(s)"))
            }
            "save" => {
                save_pipeline(&self.pipeline, path)?;
                Ok(format!("saved to {path}"))
            }
            "load" => {
                self.pipeline = load_pipeline(
                    path,
                    std::sync::Arc::clone(self.pipeline.catalog()),
                    self.settings.pipeline,
                )?;
                Ok(format!("loaded {path}"))
            }
            _ => Ok("invalid command".into()),
        }
    }
}

/// 1-based cell number to index.
fn cell_index(text: &str) -> Result<usize, Box<dyn Error>> {
    text.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(|| format!("invalid cell `{text}`").into())
}

/// `3`, `3-7` or comma-separated combinations, 1-based. Every bound must lie
/// within the `count` cells of the timeline.
fn parse_targets(text: &str, count: usize) -> Result<Vec<usize>, Box<dyn Error>> {
    let mut targets = Vec::new();
    for part in text.split(',') {
        let caps = RANGE_RE
            .captures(part)
            .ok_or_else(|| format!("invalid cell range `{part}`"))?;
        let first = cell_index(&caps[1])?;
        let last = match caps.get(2) {
            Some(m) => cell_index(m.as_str())?,
            None => first,
        };
        let (low, high) = (first.min(last), first.max(last));
        if high >= count {
            return Err(TimelineError::CellOutOfRange { index: high, count }.into());
        }
        targets.extend(low..=high);
    }
    Ok(targets)
}

fn one_based(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| (i + 1).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn print_help() {
    println!("Commands:");
    println!("  show                           List populated cells");
    println!("  fields                         List catalog fields");
    println!("  config interval=weeks start=YYYY-MM-DD end=YYYY-MM-DD duration=N");
    println!("  set <cell> <field> <value>     Set a value (JSON for lists/objects)");
    println!("  add <cell> <field>             Assign a field to a cell");
    println!("  rm <cell> <field>              Remove a field from a cell");
    println!("  note <cell> [text]             Set or clear notes");
    println!("  view <cell>                    Show visible and computed values");
    println!("  copy <src> <f1,f2> <cells>     Copy fields, e.g. copy 1 waterPH,waterEC 2-7");
    println!("  undo                           Revert the last change");
    println!("  preset save <cell> <group> <name>");
    println!("  preset apply <group> <name> <cells>");
    println!("  preset rm <group> <name>");
    println!("  preset ls [group]");
    println!("  export|import|save|load <file>");
    println!("  q                              Quit");
}
