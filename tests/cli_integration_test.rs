//! CLI integration tests for the apply, list, check and author commands.
//!
//! Tests cover:
//! - Manager construction from real INI files on disk
//! - Applying loaded sets across symbols with MockTablePort, including
//!   per-symbol failures
//! - Full apply pipeline over CSV directories
//! - Checking documents for parse failures and names defined elsewhere
//! - Authoring a document from shorthand arguments

mod common;

use clap::Parser;
use common::*;
use indiforge::adapters::csv_adapter::CsvAdapter;
use indiforge::adapters::file_config_adapter::FileConfigAdapter;
use indiforge::cli::{self, Cli};
use indiforge::domain::definition::IndicatorSet;
use indiforge::domain::error::IndiforgeError;
use indiforge::domain::table::TimeSeriesTable;
use indiforge::ports::table_port::TablePort;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ExitCode has no PartialEq, so compare the Debug form
fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

fn exit_code_is(code: ExitCode, expected: u8) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::from(expected))
}

/// Workspace with `indicators/`, `ocsv/` and `csv/` plus a config pointing
/// at them.
struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("indicators")).unwrap();
        fs::create_dir(dir.path().join("ocsv")).unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> std::path::PathBuf {
        self.dir.path().join(rel)
    }

    fn config(&self) -> String {
        format!(
            "[indicators]\ndir = {}\n\n[data]\ninput_dir = {}\noutput_dir = {}\n\n[logging]\nlevel = warn\n",
            self.path("indicators").display(),
            self.path("ocsv").display(),
            self.path("csv").display()
        )
    }

    fn write_config(&self) -> std::path::PathBuf {
        let path = self.path("indiforge.ini");
        fs::write(&path, self.config()).unwrap();
        path
    }

    fn add_set(&self, file: &str, set_name: &str, indicators: &[(&str, &str)]) {
        write_set(&self.path("indicators"), file, &make_set(set_name, indicators));
    }

    fn add_symbol(&self, symbol: &str, rows: usize) {
        let closes: Vec<f64> = (0..rows).map(|i| 10.0 + i as f64).collect();
        write_csv(&self.path("ocsv"), symbol, &make_bars(&closes));
    }
}

mod manager_from_config {
    use super::*;

    #[test]
    fn build_manager_loads_sets_from_configured_dir() {
        let ws = Workspace::new();
        ws.add_set("a.json", "trend", &[("MA3", "MA(CLOSE, 3)")]);
        ws.add_set("b.json", "osc", &[("RSI6", "RSI(CLOSE, 6)")]);
        let file = write_temp_ini(&ws.config());

        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        let manager = cli::build_manager(&adapter).unwrap();
        assert_eq!(manager.list_sets(), vec!["trend", "osc"]);
        assert_eq!(manager.indicators_dir(), ws.path("indicators"));
    }

    #[test]
    fn engine_limits_come_from_config() {
        let ws = Workspace::new();
        ws.add_set("a.json", "s", &[("SHORT", "MA(CLOSE, 2)"), ("LONG", "MA(CLOSE, 5)")]);
        let ini = format!("{}\n[engine]\nmax_window = 3\n", ws.config());
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let manager = cli::build_manager(&adapter).unwrap();
        assert_eq!(manager.engine().budget().max_window, 3);

        let out = manager.calculate(&make_table(10)).unwrap();
        assert!(out.has_column("SHORT"));
        assert!(!out.has_column("LONG"));
    }

    #[test]
    fn unbounded_depth_in_config_is_rejected() {
        let ws = Workspace::new();
        let ini = format!(
            "{}\n[engine]\nmax_depth = 1000000\nmax_formula_len = 1000000\n",
            ws.config()
        );
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        assert!(matches!(
            cli::build_manager(&adapter),
            Err(IndiforgeError::ConfigInvalid { key, .. }) if key == "max_depth"
        ));
    }

    #[test]
    fn deepest_allowed_config_isolates_nested_formulas() {
        let ws = Workspace::new();
        let nested = format!("{}1{}", "(".repeat(30_000), ")".repeat(30_000));
        let chain = vec!["CLOSE"; 10_000].join("+");
        ws.add_set(
            "a.json",
            "s",
            &[
                ("GOOD", "MA(CLOSE, 3)"),
                ("NESTED", nested.as_str()),
                ("CHAIN", chain.as_str()),
                ("AFTER", "GOOD + 1"),
            ],
        );
        let ini = format!(
            "{}\n[engine]\nmax_depth = 128\nmax_formula_len = 65536\nmax_nodes = 1000000\n",
            ws.config()
        );
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let manager = cli::build_manager(&adapter).unwrap();
        assert_eq!(manager.list_sets(), vec!["s"]);

        let out = manager.calculate(&make_table(10)).unwrap();
        assert!(out.has_column("GOOD"));
        assert!(out.has_column("AFTER"));
        assert!(!out.has_column("NESTED"));
        assert!(!out.has_column("CHAIN"));
    }

    #[test]
    fn missing_indicators_dir_key_fails() {
        let adapter = FileConfigAdapter::from_string("[data]\ninput_dir = a\n").unwrap();
        assert!(matches!(
            cli::build_manager(&adapter),
            Err(IndiforgeError::ConfigMissing { .. })
        ));
    }
}

mod apply_mock {
    use super::*;

    fn manager() -> (Workspace, indiforge::domain::manager::IndicatorManager) {
        let ws = Workspace::new();
        ws.add_set("a.json", "s", &[("MA3", "MA(CLOSE, 3)"), ("UP", "CLOSE > REF(CLOSE, 1)")]);
        let adapter = FileConfigAdapter::from_string(&ws.config()).unwrap();
        let manager = cli::build_manager(&adapter).unwrap();
        (ws, manager)
    }

    #[test]
    fn applies_to_every_symbol() {
        let (_ws, manager) = manager();
        let source = MockTablePort::new()
            .with_table("AAA", make_table(10))
            .with_table("BBB", make_table(5));
        let sink = MockTablePort::new();
        let symbols = source.list_symbols().unwrap();

        let summary = cli::apply_indicators(&manager, &source, &sink, &symbols);
        assert_eq!(summary.written, vec!["AAA", "BBB"]);
        assert!(summary.failed.is_empty());

        let out = sink.written("AAA").unwrap();
        assert_eq!(
            out.column_names(),
            vec!["open", "high", "low", "close", "volume", "MA3", "UP"]
        );
        let up = out.column("UP").unwrap();
        assert_eq!(up[0], 0.0);
        assert!(up[1..].iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn failing_symbol_does_not_stop_the_batch() {
        let (_ws, manager) = manager();
        let mut no_volume = TimeSeriesTable::new(vec![date(0), date(1)]);
        for name in ["open", "high", "low", "close"] {
            no_volume.set_column(name, vec![1.0, 2.0]).unwrap();
        }
        let source = MockTablePort::new()
            .with_table("AAA", make_table(6))
            .with_table("NOVOL", no_volume)
            .with_error("BROKEN", "disk on fire");
        let sink = MockTablePort::new();
        let symbols = source.list_symbols().unwrap();

        let summary = cli::apply_indicators(&manager, &source, &sink, &symbols);
        assert_eq!(summary.written, vec!["AAA"]);
        assert_eq!(summary.failed.len(), 2);
        assert!(matches!(
            &summary.failed[0],
            (symbol, IndiforgeError::Data { .. }) if symbol == "BROKEN"
        ));
        assert!(matches!(
            &summary.failed[1],
            (symbol, IndiforgeError::MissingColumn(col)) if symbol == "NOVOL" && col == "volume"
        ));
        assert!(sink.written("NOVOL").is_none());
    }

    #[test]
    fn empty_table_is_written_unchanged() {
        let (_ws, manager) = manager();
        let source = MockTablePort::new().with_table("EMPTY", TimeSeriesTable::from_bars(&[]));
        let sink = MockTablePort::new();
        let summary = cli::apply_indicators(&manager, &source, &sink, &["EMPTY".to_string()]);
        assert_eq!(summary.written, vec!["EMPTY"]);
        assert_eq!(sink.written("EMPTY").unwrap(), TimeSeriesTable::from_bars(&[]));
    }
}

mod apply_csv {
    use super::*;

    #[test]
    fn run_apply_writes_enriched_csvs() {
        let ws = Workspace::new();
        ws.add_set("01.json", "base", &[("MA2", "MA(CLOSE, 2)")]);
        ws.add_set("02.json", "derived", &[("GAP", "CLOSE - MA2")]);
        ws.add_symbol("600519", 4);
        ws.add_symbol("000001", 3);
        let config = ws.write_config();

        let cli = Cli::try_parse_from(["indiforge", "apply", "-c", config.to_str().unwrap()])
            .unwrap();
        assert!(is_success(cli::run(cli)));

        let out = CsvAdapter::new(ws.path("csv"));
        assert_eq!(out.list_symbols().unwrap(), vec!["000001", "600519"]);
        let table = out.read_table("600519").unwrap();
        assert_eq!(
            table.column_names(),
            vec!["open", "high", "low", "close", "volume", "MA2", "GAP"]
        );
        assert!(table.column("MA2").unwrap()[0].is_nan());
        assert_eq!(table.column("MA2").unwrap()[1], 10.5);
        assert_eq!(table.column("GAP").unwrap()[3], 0.5);

        let text = fs::read_to_string(ws.path("csv").join("600519.csv")).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with(",,"));
    }

    #[test]
    fn run_apply_single_symbol() {
        let ws = Workspace::new();
        ws.add_set("a.json", "s", &[("X", "CLOSE * 2")]);
        ws.add_symbol("AAA", 3);
        ws.add_symbol("BBB", 3);
        let config = ws.write_config();

        let cli = Cli::try_parse_from([
            "indiforge",
            "apply",
            "-c",
            config.to_str().unwrap(),
            "--symbol",
            "BBB",
        ])
        .unwrap();
        assert!(is_success(cli::run(cli)));
        assert!(ws.path("csv").join("BBB.csv").exists());
        assert!(!ws.path("csv").join("AAA.csv").exists());
    }

    #[test]
    fn run_apply_reports_failed_symbol() {
        let ws = Workspace::new();
        ws.add_set("a.json", "s", &[("X", "CLOSE")]);
        fs::write(ws.path("ocsv").join("BAD.csv"), "date,close\n2024-01-01,1\n").unwrap();
        let config = ws.write_config();

        let cli = Cli::try_parse_from(["indiforge", "apply", "-c", config.to_str().unwrap()])
            .unwrap();
        assert!(exit_code_is(cli::run(cli), 5));
    }

    #[test]
    fn run_apply_missing_config_fails() {
        let cli = Cli::try_parse_from(["indiforge", "apply", "-c", "/nonexistent/indiforge.ini"])
            .unwrap();
        assert!(exit_code_is(cli::run(cli), 2));
    }

    #[test]
    fn run_list_succeeds() {
        let ws = Workspace::new();
        ws.add_set("a.json", "s", &[("X", "CLOSE")]);
        let config = ws.write_config();
        let cli =
            Cli::try_parse_from(["indiforge", "list", "-c", config.to_str().unwrap()]).unwrap();
        assert!(is_success(cli::run(cli)));
    }
}

mod check_and_author {
    use super::*;

    fn run_check(path: &Path) -> ExitCode {
        let cli =
            Cli::try_parse_from(["indiforge", "check", "--set", path.to_str().unwrap()]).unwrap();
        cli::run(cli)
    }

    #[test]
    fn check_counts_parse_failures() {
        let set = make_set(
            "s",
            &[("A", "MA(CLOSE, 5)"), ("B", "CLOSE +"), ("C", "((HIGH)")],
        );
        let engine = engine();
        assert_eq!(cli::check_set(&set, &engine).unwrap().parse_failures, 2);
    }

    #[test]
    fn check_lists_names_defined_outside_the_set() {
        let set = make_set(
            "s",
            &[
                ("A", "MA(CLOSE, 5)"),
                ("B", "A + OTHER_SET_COL"),
                ("C", "B * VOL - FACTOR + LATER"),
                ("LATER", "HHV(HIGH, 3)"),
            ],
        );
        let summary = cli::check_set(&set, &engine()).unwrap();
        assert_eq!(summary.parse_failures, 0);
        assert_eq!(
            summary.unresolved,
            vec![
                ("B".to_string(), vec!["OTHER_SET_COL".to_string()]),
                (
                    "C".to_string(),
                    vec!["FACTOR".to_string(), "LATER".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn check_rejects_invalid_set() {
        let set = make_set("s", &[("CLOSE", "OPEN")]);
        assert!(matches!(
            cli::check_set(&set, &engine()),
            Err(IndiforgeError::DefinitionInvalid { .. })
        ));
    }

    #[test]
    fn check_command_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_set(dir.path(), "good.json", &make_set("g", &[("A", "CLOSE")]));
        let bad = write_set(dir.path(), "bad.json", &make_set("b", &[("A", "CLOSE +")]));
        let junk = dir.path().join("junk.json");
        fs::write(&junk, "[]").unwrap();

        assert!(is_success(run_check(&good)));
        assert!(exit_code_is(run_check(&bad), 4));
        assert!(exit_code_is(run_check(&junk), 4));
        assert!(exit_code_is(run_check(&dir.path().join("missing.json")), 1));
    }

    #[test]
    fn author_writes_normalized_document() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("authored").join("basic.json");
        let cli = Cli::try_parse_from([
            "indiforge",
            "author",
            "--name",
            "basic",
            "--formula",
            "ma5=MA(C,5)",
            "--formula",
            "range=H-L",
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        assert!(is_success(cli::run(cli)));

        let set = IndicatorSet::from_json(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(set.set_name, "basic");
        assert_eq!(set.indicators[0].name, "MA5");
        assert_eq!(set.indicators[0].formula, "MA(CLOSE,5)");
        assert_eq!(set.indicators[1].formula, "HIGH-LOW");
    }

    #[test]
    fn author_rejects_malformed_argument() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.json");
        let cli = Cli::try_parse_from([
            "indiforge",
            "author",
            "--name",
            "x",
            "--formula",
            "no_equals_sign",
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        assert!(exit_code_is(cli::run(cli), 4));
        assert!(!out.exists());
    }
}
