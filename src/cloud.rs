//! Word cloud rendering of a keyword table.

use std::f64::consts::PI;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use log::{debug, warn};

use crate::error::ShuiyuanError;
use crate::keywords::KeywordFrequencyTable;

/// Load a TrueType/OpenType font that covers the script of the corpus.
pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec> {
    let path = path.as_ref();
    let not_found = || ShuiyuanError::ResourceNotFound {
        kind: "font",
        path: path.to_path_buf(),
    };
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found().into()),
        Err(err) => return Err(err).context(format!("Failed to read {}", path.display())),
    };
    FontVec::try_from_vec(bytes)
        .map_err(|_| not_found())
        .with_context(|| format!("{} is not a usable font", path.display()))
}

/// A term placed on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub word: String,
    pub font_size: f32,
    /// Top left corner.
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PlacedWord {
    pub fn overlaps(&self, other: &PlacedWord) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Occupied cells of the canvas.
///
/// Keeps a summed-area table so whether a box is free is answered with four
/// lookups, independent of the number of placed terms.
struct OccupancyGrid {
    /// Pixels per cell side.
    cell: u32,
    /// Columns.
    width: usize,
    /// Rows.
    height: usize,
    occupied: Vec<bool>,
    /// `(width + 1) * (height + 1)` prefix sums of `occupied`.
    integral: Vec<u32>,
}

impl OccupancyGrid {
    fn new(canvas_width: u32, canvas_height: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let width = (canvas_width / cell) as usize;
        let height = (canvas_height / cell) as usize;
        Self {
            cell,
            width,
            height,
            occupied: vec![false; width * height],
            integral: vec![0; (width + 1) * (height + 1)],
        }
    }

    /// Number of cells needed to cover `px` pixels.
    fn cells(&self, px: u32) -> usize {
        ((px + self.cell - 1) / self.cell) as usize
    }

    fn is_free(&self, x: usize, y: usize, w: usize, h: usize) -> bool {
        let stride = self.width + 1;
        let at = |x: usize, y: usize| self.integral[y * stride + x];
        at(x + w, y + h) + at(x, y) == at(x, y + h) + at(x + w, y)
    }

    /// The first free position for a `w` x `h` box in row-major order.
    fn first_free(&self, w: usize, h: usize) -> Option<(usize, usize)> {
        if w > self.width || h > self.height {
            return None;
        }
        (0..=self.height - h)
            .flat_map(|y| (0..=self.width - w).map(move |x| (x, y)))
            .find(|&(x, y)| self.is_free(x, y, w, h))
    }

    fn occupy(&mut self, x: usize, y: usize, w: usize, h: usize) {
        for row in y..y + h {
            let start = row * self.width;
            self.occupied[start + x..start + x + w]
                .iter_mut()
                .for_each(|cell| *cell = true);
        }
        // rows above `y` keep their sums
        let stride = self.width + 1;
        for row in y..self.height {
            let mut run = 0;
            for col in 0..self.width {
                run += u32::from(self.occupied[row * self.width + col]);
                self.integral[(row + 1) * stride + col + 1] =
                    self.integral[row * stride + col + 1] + run;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordCloud {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    pub background: Rgb<u8>,
    /// Terms are dropped once they would need a smaller font.
    pub min_font_size: f32,
    /// Size of the most frequent term, defaults to 2/5 of the height.
    pub max_font_size: Option<f32>,
    /// Pixels the font shrinks by when a term does not fit.
    pub font_step: f32,
    pub max_words: usize,
    /// Side length in pixels of the cells free space is tracked in.
    pub cell_size: u32,
    /// Colors cycled through in placement order.
    pub palette: Vec<Rgb<u8>>,
    /// Font used if none is passed explicitly.
    pub font_path: PathBuf,
}

impl WordCloud {
    pub const DEFAULT_FONT: &'static str = "PingFangSC-Regular.ttf";

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn min_font_size(mut self, min_font_size: f32) -> Self {
        self.min_font_size = min_font_size;
        self
    }

    pub fn max_font_size(mut self, max_font_size: f32) -> Self {
        self.max_font_size = Some(max_font_size);
        self
    }

    pub fn max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    pub fn font_path<P: AsRef<Path>>(mut self, font_path: P) -> Self {
        self.font_path = font_path.as_ref().to_path_buf();
        self
    }

    fn largest_font(&self) -> f32 {
        self.max_font_size
            .unwrap_or(self.height as f32 * 2.0 / 5.0)
            .max(self.min_font_size)
    }

    /// Place the terms of `table` in order, the font size of a term is
    /// proportional to its frequency.
    ///
    /// A term never gets a larger font than the term placed before it, so
    /// the size only shrinks over the whole layout.
    ///
    /// `measure` returns the pixel extent of a term at a font size.
    pub fn layout<M>(&self, table: &KeywordFrequencyTable, measure: M) -> Vec<PlacedWord>
    where
        M: Fn(&str, f32) -> (u32, u32),
    {
        let mut placed: Vec<PlacedWord> = Vec::new();
        let max_freq = match table.max_frequency() {
            Some(freq) if freq > 0.0 => freq,
            _ => return placed,
        };
        let mut grid = OccupancyGrid::new(self.width, self.height, self.cell_size);
        let mut current = self.largest_font();

        for row in table
            .iter()
            .filter(|row| row.frequency > 0.0)
            .take(self.max_words)
        {
            let proportional = (self.largest_font() * (row.frequency / max_freq) as f32)
                .max(self.min_font_size);
            let mut font_size = current.min(proportional);
            let spot = loop {
                let (width, height) = measure(&row.keyword, font_size);
                if width > 0 && height > 0 {
                    if let Some((x, y)) = self.find_spot(&mut grid, width, height) {
                        break Some(PlacedWord {
                            word: row.keyword.clone(),
                            font_size,
                            x,
                            y,
                            width,
                            height,
                        });
                    }
                }
                font_size -= self.font_step;
                if self.font_step <= 0.0 || font_size < self.min_font_size {
                    break None;
                }
            };
            match spot {
                Some(word) => {
                    current = word.font_size;
                    placed.push(word);
                }
                None => {
                    // everything after this is smaller and the canvas is full
                    warn!(
                        "no room left for {:?}, placed {} terms",
                        row.keyword,
                        placed.len()
                    );
                    break;
                }
            }
        }
        debug!("placed {} of {} terms", placed.len(), table.len());
        placed
    }

    /// Walk an archimedean spiral from the canvas center outwards until a
    /// box of `width` x `height` fits into free cells, and occupy them.
    ///
    /// The spiral ends once it has swept half the canvas diagonal, a box that
    /// fits somewhere off the spiral takes the first free position.
    fn find_spot(&self, grid: &mut OccupancyGrid, width: u32, height: u32) -> Option<(u32, u32)> {
        let (w, h) = (grid.cells(width), grid.cells(height));
        // no free position anywhere, nothing to search for
        let fallback = grid.first_free(w, h)?;
        let center_x = (grid.width - w) as f64 / 2.0;
        let center_y = (grid.height - h) as f64 / 2.0;
        let aspect = grid.width as f64 / (grid.height as f64).max(1.0);
        let max_radius = (center_x / aspect).hypot(center_y) + 1.0;
        // distance between two turns and between two tried positions in cells
        let gap = 1.0;
        let step = 1.0 / aspect.max(1.0);

        let mut theta: f64 = 0.0;
        loop {
            let radius = gap * theta / (2.0 * PI);
            if radius > max_radius {
                grid.occupy(fallback.0, fallback.1, w, h);
                return Some((fallback.0 as u32 * grid.cell, fallback.1 as u32 * grid.cell));
            }
            let x = (center_x + radius * theta.cos() * aspect).round();
            let y = (center_y + radius * theta.sin()).round();
            if x >= 0.0 && y >= 0.0 {
                let (x, y) = (x as usize, y as usize);
                if x + w <= grid.width && y + h <= grid.height && grid.is_free(x, y, w, h) {
                    grid.occupy(x, y, w, h);
                    return Some((x as u32 * grid.cell, y as u32 * grid.cell));
                }
            }
            theta += step / radius.max(step);
        }
    }

    /// Render the terms of `table` with `font`.
    pub fn render(&self, table: &KeywordFrequencyTable, font: &FontVec) -> RgbImage {
        let placed = self.layout(table, |word, size| text_size(PxScale::from(size), font, word));
        let mut canvas = RgbImage::from_pixel(self.width, self.height, self.background);
        for (i, word) in placed.iter().enumerate() {
            let color = self
                .palette
                .get(i % self.palette.len().max(1))
                .copied()
                .unwrap_or(Rgb([0, 0, 0]));
            draw_text_mut(
                &mut canvas,
                color,
                word.x as i32,
                word.y as i32,
                PxScale::from(word.font_size),
                font,
                &word.word,
            );
        }
        canvas
    }

    /// Render with `font` and store the image at `out`.
    pub fn render_to_file<P: AsRef<Path>>(
        &self,
        table: &KeywordFrequencyTable,
        font: &FontVec,
        out: P,
    ) -> Result<()> {
        let out = out.as_ref();
        self.render(table, font)
            .save(out)
            .with_context(|| format!("Failed to write word cloud to {}", out.display()))
    }
}

impl Default for WordCloud {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 800,
            background: Rgb([255, 255, 255]),
            min_font_size: 8.0,
            max_font_size: None,
            font_step: 1.0,
            max_words: 200,
            cell_size: 4,
            palette: vec![
                Rgb([68, 1, 84]),
                Rgb([59, 82, 139]),
                Rgb([33, 145, 140]),
                Rgb([94, 201, 98]),
                Rgb([253, 231, 37]),
                Rgb([49, 104, 142]),
                Rgb([53, 183, 121]),
            ],
            font_path: PathBuf::from(WordCloud::DEFAULT_FONT),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::keywords::KeywordFrequency;

    fn table(rows: &[(&str, f64)]) -> KeywordFrequencyTable {
        KeywordFrequencyTable::new(rows.iter().map(|(k, f)| KeywordFrequency {
            keyword: k.to_string(),
            frequency: *f,
        }))
    }

    /// Every char is a square of the font size.
    fn monospace(word: &str, size: f32) -> (u32, u32) {
        let size = size.ceil() as u32;
        (word.chars().count() as u32 * size, size)
    }

    #[test]
    fn sizes_follow_frequency() {
        let cloud = WordCloud::default().size(400, 200).max_font_size(40.0);
        let placed = cloud.layout(&table(&[("猫", 2.0), ("狗", 1.0), ("鱼", 0.5)]), monospace);
        assert_eq!(placed.len(), 3);
        assert_eq!(placed[0].word, "猫");
        assert_eq!(placed[0].font_size, 40.0);
        assert_eq!(placed[1].font_size, 20.0);
        assert_eq!(placed[2].font_size, 10.0);
    }

    #[test]
    fn placed_words_do_not_overlap() {
        let cloud = WordCloud::default().size(300, 150);
        let rows: Vec<(String, f64)> = (0..40).map(|i| (format!("w{}", i), 40.0 - i as f64)).collect();
        let rows: Vec<(&str, f64)> = rows.iter().map(|(k, f)| (k.as_str(), *f)).collect();
        let placed = cloud.layout(&table(&rows), monospace);
        assert!(!placed.is_empty());
        for (i, a) in placed.iter().enumerate() {
            assert!(a.x + a.width <= 300 && a.y + a.height <= 150);
            assert!(a.font_size >= cloud.min_font_size);
            for b in &placed[i + 1..] {
                assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn first_word_is_centered() {
        let cloud = WordCloud::default().size(200, 100).max_font_size(20.0);
        let placed = cloud.layout(&table(&[("ab", 1.0)]), monospace);
        assert_eq!(placed[0].x, 80);
        assert_eq!(placed[0].y, 40);
    }

    #[test]
    fn oversized_word_shrinks() {
        let cloud = WordCloud::default().size(100, 100).max_font_size(80.0);
        let placed = cloud.layout(&table(&[("abcd", 1.0)]), monospace);
        assert_eq!(placed.len(), 1);
        assert!(placed[0].width <= 100);
        assert_eq!(placed[0].font_size, 25.0);
    }

    #[test]
    fn stops_when_full() {
        // any second 10x10 box overlaps the centered first one
        let cloud = WordCloud::default().size(20, 20).min_font_size(10.0);
        let placed = cloud.layout(&table(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]), monospace);
        assert_eq!(placed.len(), 1);
        assert_eq!((placed[0].x, placed[0].y), (4, 4));
    }

    #[test]
    fn empty_table() {
        let placed = WordCloud::default().layout(&KeywordFrequencyTable::default(), monospace);
        assert!(placed.is_empty());
    }

    #[test]
    fn missing_font() {
        let err = load_font("/no/such/font.ttf").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShuiyuanError>(),
            Some(ShuiyuanError::ResourceNotFound { kind: "font", .. })
        ));
    }

    #[test]
    fn equal_weights_lay_out_quickly() {
        let rows: Vec<(String, f64)> = (0..200).map(|i| (format!("词{}", i), 0.25)).collect();
        let rows: Vec<(&str, f64)> = rows.iter().map(|(k, f)| (k.as_str(), *f)).collect();
        let cloud = WordCloud::default();

        let start = Instant::now();
        let placed = cloud.layout(&table(&rows), monospace);
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_secs(20), "layout took {:?}", elapsed);
        assert!(placed.len() >= 100, "placed only {}", placed.len());
        assert!(placed
            .windows(2)
            .all(|pair| pair[0].font_size >= pair[1].font_size));
        for (i, a) in placed.iter().enumerate() {
            assert!(a.x + a.width <= 1600 && a.y + a.height <= 800);
            for b in &placed[i + 1..] {
                assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    /// Any font installed on this machine.
    fn system_font() -> Option<FontVec> {
        fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
            if let Ok(entries) = fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        walk(&path, found);
                    } else if matches!(
                        path.extension().and_then(|ext| ext.to_str()),
                        Some("ttf") | Some("otf")
                    ) {
                        found.push(path);
                    }
                }
            }
        }
        let mut found = vec![PathBuf::from(WordCloud::DEFAULT_FONT)];
        for dir in &["/usr/share/fonts", "/usr/local/share/fonts", "/Library/Fonts"] {
            walk(Path::new(dir), &mut found);
        }
        found.iter().find_map(|path| load_font(path).ok())
    }

    #[test]
    fn render_full_canvas() {
        let font = match system_font() {
            Some(font) => font,
            None => {
                eprintln!("no font installed, skipping");
                return;
            }
        };
        let table = table(&[("rust", 2.0), ("cargo", 1.0), ("crate", 0.5)]);
        let cloud = WordCloud::default();

        let canvas = cloud.render(&table, &font);
        assert_eq!(canvas.dimensions(), (1600, 800));
        assert!(canvas.pixels().any(|pixel| *pixel != cloud.background));

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cloud.png");
        cloud.render_to_file(&table, &font, &out).unwrap();
        let saved = image::open(&out).unwrap();
        assert_eq!((saved.width(), saved.height()), (1600, 800));
    }
}
