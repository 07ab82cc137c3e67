use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::error::{BacktestError, Result, Table};
use crate::records::{MatchRecord, OddsRecord, Pick, PredictionRecord, Score};

/// One untyped input row: column name to value.
pub type Row = Map<String, Value>;

/// Three named streams of row maps.
pub trait RowSource {
    fn rows(&mut self, table: Table) -> Result<Vec<Row>>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub matches: Vec<Row>,
    pub predictions: Vec<Row>,
    pub odds: Vec<Row>,
}

impl MemorySource {
    pub fn new(matches: Vec<Row>, predictions: Vec<Row>, odds: Vec<Row>) -> Self {
        Self {
            matches,
            predictions,
            odds,
        }
    }
}

impl RowSource for MemorySource {
    fn rows(&mut self, table: Table) -> Result<Vec<Row>> {
        Ok(match table {
            Table::Matches => self.matches.clone(),
            Table::Predictions => self.predictions.clone(),
            Table::Odds => self.odds.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TablePaths {
    pub matches: PathBuf,
    pub predictions: PathBuf,
    pub odds: PathBuf,
}

impl TablePaths {
    pub fn new(
        matches: impl Into<PathBuf>,
        predictions: impl Into<PathBuf>,
        odds: impl Into<PathBuf>,
    ) -> Self {
        Self {
            matches: matches.into(),
            predictions: predictions.into(),
            odds: odds.into(),
        }
    }

    pub fn get(&self, table: Table) -> &Path {
        match table {
            Table::Matches => &self.matches,
            Table::Predictions => &self.predictions,
            Table::Odds => &self.odds,
        }
    }
}

/// Headered CSV files, one per table.
#[derive(Debug, Clone)]
pub struct CsvSource {
    paths: TablePaths,
}

impl CsvSource {
    pub fn new(paths: TablePaths) -> Self {
        Self { paths }
    }
}

impl RowSource for CsvSource {
    fn rows(&mut self, table: Table) -> Result<Vec<Row>> {
        let path = self.paths.get(table);
        let file = open_input(table, path)?;
        read_csv_rows(table, file)
    }
}

/// JSON files each holding an array of objects.
#[derive(Debug, Clone)]
pub struct JsonSource {
    paths: TablePaths,
}

impl JsonSource {
    pub fn new(paths: TablePaths) -> Self {
        Self { paths }
    }
}

impl RowSource for JsonSource {
    fn rows(&mut self, table: Table) -> Result<Vec<Row>> {
        let path = self.paths.get(table);
        let raw = fs::read_to_string(path).map_err(|e| {
            BacktestError::table_contract(table, format!("cannot read {}: {e}", path.display()))
        })?;
        parse_json_rows(table, &raw)
    }
}

/// Picks CSV or JSON per table from the file extension.
#[derive(Debug, Clone)]
pub struct FileSource {
    paths: TablePaths,
}

impl FileSource {
    pub fn new(paths: TablePaths) -> Self {
        Self { paths }
    }
}

impl RowSource for FileSource {
    fn rows(&mut self, table: Table) -> Result<Vec<Row>> {
        let is_json = self
            .paths
            .get(table)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            JsonSource::new(self.paths.clone()).rows(table)
        } else {
            CsvSource::new(self.paths.clone()).rows(table)
        }
    }
}

/// Tables `matches`, `predictions` and `odds` inside one SQLite database.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BacktestError::table_contract(
                Table::Matches,
                format!("sqlite database {} not found", path.display()),
            ));
        }
        Ok(Self::new(Connection::open(path)?))
    }

    fn has_table(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl RowSource for SqliteSource {
    fn rows(&mut self, table: Table) -> Result<Vec<Row>> {
        if !self.has_table(table.name())? {
            return Err(BacktestError::table_contract(
                table,
                "table missing from database",
            ));
        }
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", table.name()))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let row_no = out.len() + 1;
            let mut map = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                let value = match row.get_ref(idx)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(v) => Value::from(v),
                    ValueRef::Real(v) => match Number::from_f64(v) {
                        Some(n) => Value::Number(n),
                        None => {
                            return Err(BacktestError::contract(
                                table,
                                row_no,
                                name.as_str(),
                                "non-finite number",
                            ));
                        }
                    },
                    ValueRef::Text(bytes) => {
                        Value::String(String::from_utf8_lossy(bytes).into_owned())
                    }
                    ValueRef::Blob(_) => {
                        return Err(BacktestError::contract(
                            table,
                            row_no,
                            name.as_str(),
                            "binary values are not supported",
                        ));
                    }
                };
                map.insert(name.clone(), value);
            }
            out.push(map);
        }
        Ok(out)
    }
}

pub fn read_csv_rows<R: io::Read>(table: Table, reader: R) -> Result<Vec<Row>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(BacktestError::table_contract(table, "missing header row"));
    }

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut map = Row::new();
        for (name, value) in headers.iter().zip(record.iter()) {
            map.insert(name.to_string(), Value::String(value.to_string()));
        }
        out.push(map);
    }
    Ok(out)
}

pub fn parse_json_rows(table: Table, raw: &str) -> Result<Vec<Row>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| BacktestError::table_contract(table, format!("invalid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(BacktestError::table_contract(
            table,
            "expected a JSON array of objects",
        ));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(BacktestError::InputContract {
                table,
                row: Some(idx + 1),
                field: None,
                message: "expected an object".to_string(),
            }),
        })
        .collect()
}

fn open_input(table: Table, path: &Path) -> Result<fs::File> {
    fs::File::open(path).map_err(|e| {
        BacktestError::table_contract(table, format!("cannot read {}: {e}", path.display()))
    })
}

/// Typed contents of the three input tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    pub matches: Vec<MatchRecord>,
    pub predictions: Vec<PredictionRecord>,
    pub odds: Vec<OddsRecord>,
}

impl Inputs {
    /// SHA-256 over the canonical form of every typed record.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for m in &self.matches {
            let score = m
                .score
                .map(|s| format!("{}:{}", s.home, s.away))
                .unwrap_or_default();
            hasher.update(
                format!(
                    "m|{}|{}|{}|{}|{}|{}\n",
                    m.fixture_id, m.date, m.league_name, m.home_team, m.away_team, score
                )
                .as_bytes(),
            );
        }
        for p in &self.predictions {
            hasher.update(
                format!(
                    "p|{}|{}|{:?}|{}|{}\n",
                    p.fixture_id, p.date, p.confidence, p.prediction_1x2, p.prediction_ou
                )
                .as_bytes(),
            );
        }
        for o in &self.odds {
            hasher.update(
                format!("o|{}|{:?}|{:?}\n", o.fixture_id, o.odds_1x2, o.odds_ou).as_bytes(),
            );
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

/// Reads and types all three tables. The first offending row aborts the load.
pub fn load(source: &mut dyn RowSource) -> Result<Inputs> {
    let matches = parse_matches(&source.rows(Table::Matches)?)?;
    let predictions = parse_predictions(&source.rows(Table::Predictions)?)?;
    let odds = parse_odds(&source.rows(Table::Odds)?)?;
    Ok(Inputs {
        matches,
        predictions,
        odds,
    })
}

pub fn parse_matches(rows: &[Row]) -> Result<Vec<MatchRecord>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let r = RowReader::new(Table::Matches, idx + 1, row);
        let fixture_id = r.int("fixture_id")?;
        if !seen.insert(fixture_id) {
            return Err(r.error("fixture_id", format!("duplicate fixture_id {fixture_id}")));
        }
        let home = r.opt_score("home_score")?;
        let away = r.opt_score("away_score")?;
        let score = match (home, away) {
            (Some(home), Some(away)) => Some(Score { home, away }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(r.error("away_score", "home_score present without away_score"));
            }
            (None, Some(_)) => {
                return Err(r.error("home_score", "away_score present without home_score"));
            }
        };
        out.push(MatchRecord {
            fixture_id,
            date: r.date("date")?,
            league_name: r.text("league_name")?,
            home_team: r.text("home_team")?,
            away_team: r.text("away_team")?,
            score,
        });
    }
    Ok(out)
}

pub fn parse_predictions(rows: &[Row]) -> Result<Vec<PredictionRecord>> {
    let mut out = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let r = RowReader::new(Table::Predictions, idx + 1, row);
        let confidence = r.float("confidence")?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(r.error(
                "confidence",
                format!("confidence {confidence} is outside [0, 1]"),
            ));
        }
        let raw_1x2 = r.text("prediction_1x2")?;
        let prediction_1x2 = Pick::parse_1x2(&raw_1x2).ok_or_else(|| {
            r.error(
                "prediction_1x2",
                format!("expected one of 1, X, 2, got {raw_1x2:?}"),
            )
        })?;
        let raw_ou = r.text("prediction_ou")?;
        let prediction_ou = Pick::parse_ou(&raw_ou).ok_or_else(|| {
            r.error(
                "prediction_ou",
                format!("expected Over or Under, got {raw_ou:?}"),
            )
        })?;
        out.push(PredictionRecord {
            fixture_id: r.int("fixture_id")?,
            date: r.date("date")?,
            confidence,
            prediction_1x2,
            prediction_ou,
        });
    }
    Ok(out)
}

pub fn parse_odds(rows: &[Row]) -> Result<Vec<OddsRecord>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let r = RowReader::new(Table::Odds, idx + 1, row);
        let fixture_id = r.int("fixture_id")?;
        let odds_1x2 = r.price("odds_1x2")?;
        let odds_ou = r.price("odds_ou")?;
        if !seen.insert(fixture_id) {
            continue;
        }
        out.push(OddsRecord {
            fixture_id,
            odds_1x2,
            odds_ou,
        });
    }
    Ok(out)
}

/// Accepts `YYYY-MM-DD`, RFC 3339, and naive date-times read as UTC.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

struct RowReader<'a> {
    table: Table,
    row: usize,
    map: &'a Row,
}

impl<'a> RowReader<'a> {
    fn new(table: Table, row: usize, map: &'a Row) -> Self {
        Self { table, row, map }
    }

    fn error(&self, field: &str, message: impl Into<String>) -> BacktestError {
        BacktestError::contract(self.table, self.row, field, message)
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        }
    }

    fn require(&self, key: &str) -> Result<&'a Value> {
        self.get(key)
            .ok_or_else(|| self.error(key, "missing required value"))
    }

    fn int(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        as_integer(value)
            .ok_or_else(|| self.error(key, format!("expected an integer, got {value}")))
    }

    fn opt_score(&self, key: &str) -> Result<Option<u32>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let goals = as_integer(value)
            .ok_or_else(|| self.error(key, format!("expected an integer, got {value}")))?;
        if goals < 0 {
            return Err(self.error(key, "negative score"));
        }
        u32::try_from(goals)
            .map(Some)
            .map_err(|_| self.error(key, format!("score {goals} is out of range")))
    }

    fn float(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        let v = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| self.error(key, format!("expected a number, got {value}")))?;
        if !v.is_finite() {
            return Err(self.error(key, "non-finite number"));
        }
        Ok(v)
    }

    fn price(&self, key: &str) -> Result<f64> {
        let v = self.float(key)?;
        if v <= 0.0 {
            return Err(self.error(key, format!("odds must be positive, got {v}")));
        }
        Ok(v)
    }

    fn text(&self, key: &str) -> Result<String> {
        match self.require(key)? {
            Value::String(s) => Ok(s.trim().to_string()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(self.error(key, format!("expected text, got {other}"))),
        }
    }

    fn date(&self, key: &str) -> Result<NaiveDate> {
        let value = self.require(key)?;
        let Value::String(raw) = value else {
            return Err(self.error(key, format!("expected a date string, got {value}")));
        };
        parse_date(raw).ok_or_else(|| self.error(key, format!("unparseable date {raw:?}")))
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| integral_f64(n.as_f64()?)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| integral_f64(s.parse::<f64>().ok()?))
        }
        _ => None,
    }
}

fn integral_f64(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15).then_some(v as i64)
}
