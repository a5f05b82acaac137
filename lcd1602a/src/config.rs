use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use dotenv::var;
use eyre::{WrapErr, ensure};
use serde::{Serialize, Deserialize};
use lcd1602a_gpio::lcd::hd44780::driver::{CGRAM_SLOTS, CharacterFont, MAX_LINES};

/// Characters the controller's display RAM holds, whatever the geometry.
const DDRAM_SIZE: usize = 80;

/// Display settings of the demo, stored as JSON.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Config {
    pub columns: u8,
    pub rows: u8,
    /// Use the 5x10 font. Only honored on single-line displays.
    #[serde(default)]
    pub tall_font: bool,
    /// Custom characters loaded into CGRAM slots 0, 1, ...
    pub glyphs: Vec<[u8; 8]>,
}

impl Config {
    /// Where the config lives: `CONFIG_FILE`, or `config.json` in the working directory.
    pub fn path() -> PathBuf {
        var("CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.json"))
    }

    /// Loads the config from [Self::path]. A missing file is not an error.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> eyre::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(path)?);
        let config: Config = serde_json::from_reader(reader)
            .wrap_err_with(|| format!("Invalid config file {}", path.display()))?;
        config
            .validate()
            .wrap_err_with(|| format!("Unusable config file {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self) -> eyre::Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> eyre::Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Checks the settings against what the controller can show.
    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(
            (1..=MAX_LINES).contains(&self.rows),
            "rows must be 1 to {}, got {}",
            MAX_LINES,
            self.rows
        );
        ensure!(self.columns > 0, "columns must not be 0");
        ensure!(
            self.columns as usize * self.rows as usize <= DDRAM_SIZE,
            "{}x{} doesn't fit the {} characters of display RAM",
            self.columns,
            self.rows,
            DDRAM_SIZE
        );
        ensure!(
            self.glyphs.len() <= CGRAM_SLOTS as usize,
            "at most {} glyphs fit, got {}",
            CGRAM_SLOTS,
            self.glyphs.len()
        );
        for (slot, glyph) in self.glyphs.iter().enumerate() {
            ensure!(
                glyph.iter().all(|row| *row <= 0b11111),
                "glyph {} has rows wider than 5 dots",
                slot
            );
        }
        Ok(())
    }

    pub fn font(&self) -> CharacterFont {
        if self.tall_font {
            CharacterFont::Dots5x10
        } else {
            CharacterFont::Dots5x8
        }
    }
}

pub const HEART: [u8; 8] = [
    0b00000, 0b01010, 0b11111, 0b11111, 0b11111, 0b01110, 0b00100, 0b00000,
];
pub const SMILEY: [u8; 8] = [
    0b00000, 0b00000, 0b01010, 0b00000, 0b00000, 0b10001, 0b01110, 0b00000,
];

impl Default for Config {
    fn default() -> Self {
        Config {
            columns: 16,
            rows: 2,
            tall_font: false,
            glyphs: vec![HEART, SMILEY],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::process;

    fn temp_path(name: &str) -> PathBuf {
        temp_dir().join(format!("lcd1602a-{}-{}.json", process::id(), name))
    }

    #[test]
    fn parses_without_font() {
        let config: Config =
            serde_json::from_str(r#"{"columns": 20, "rows": 4, "glyphs": [[1,2,3,4,5,6,7,8]]}"#)
                .unwrap();
        assert_eq!(config.columns, 20);
        assert_eq!(config.rows, 4);
        assert_eq!(config.font(), CharacterFont::Dots5x8);
        assert_eq!(config.glyphs, vec![[1, 2, 3, 4, 5, 6, 7, 8]]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_has_two_glyphs() {
        let config = Config::default();
        assert_eq!(config.glyphs, vec![HEART, SMILEY]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_what_the_display_cannot_show() {
        let rows = Config { rows: 5, ..Config::default() };
        assert!(rows.validate().is_err());

        let no_rows = Config { rows: 0, ..Config::default() };
        assert!(no_rows.validate().is_err());

        let too_wide = Config { columns: 41, ..Config::default() };
        assert!(too_wide.validate().is_err());

        let glyphs = Config { glyphs: vec![HEART; 9], ..Config::default() };
        assert!(glyphs.validate().is_err());

        let wide_glyph = Config { glyphs: vec![[0b100000; 8]], ..Config::default() };
        assert!(wide_glyph.validate().is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let path = temp_path("saved");
        let config = Config { columns: 20, rows: 4, ..Config::default() };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, Some(config));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let path = temp_path("missing");
        assert!(Config::load_from(&path).unwrap().is_none());
    }

    #[test]
    fn invalid_file_is_reported() {
        let path = temp_path("invalid");
        std::fs::write(&path, r#"{"columns": 16, "rows": 9, "glyphs": []}"#).unwrap();

        let result = Config::load_from(&path);
        std::fs::remove_file(&path).unwrap();
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("Unusable config file"));
    }
}
