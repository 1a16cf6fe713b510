//! Visualizer settings, loadable from YAML.
//!
//! Every field has a default, so a file only needs the keys it changes. Values that make no
//! sense (a 1-wide grid, zero frames per second, a negative endpoint spread) are clamped
//! rather than rejected.

use std::fs;
use std::path::Path;

use crate::cells::Cartesian2DCoordinate;
use crate::consumer::ConsumerSettings;
use crate::endpoints::Endpoints;
use crate::engine::SearchAlgorithm;
use crate::errors::*;
use crate::grid_dimensions::GridDimensions;
use crate::producer::ReleasePolicy;
use crate::units::{BlockLength, ColumnLength, RowLength};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub length: usize,
    pub width: usize,
    pub block_length: usize,
    /// Endpoints used until a maze picks its own, and kept clear in a placeholder maze.
    pub start: (u32, u32),
    pub end: (u32, u32),
    /// Minimum endpoint separation as a fraction of the grid diagonal.
    pub distance_coefficient: f32,
    pub algorithm: SearchAlgorithm,
    /// Show a random placeholder maze when the engine produces nothing.
    pub fallback_on_no_data: bool,
    pub release_policy: ReleasePolicy,
    pub generation_playback: ConsumerSettings,
    pub search_playback: ConsumerSettings,
    /// Seed for the stand-in engine and endpoint choice; random when absent.
    pub seed: Option<u64>,
}

impl Default for VisualizerConfig {
    fn default() -> VisualizerConfig {
        VisualizerConfig {
            length: 30,
            width: 30,
            block_length: 1,
            start: (1, 1),
            end: (8, 8),
            distance_coefficient: 0.67,
            algorithm: SearchAlgorithm::Bfs,
            fallback_on_no_data: true,
            release_policy: ReleasePolicy::Inline,
            generation_playback: ConsumerSettings::generation(),
            search_playback: ConsumerSettings::search(),
            seed: None,
        }
    }
}

impl VisualizerConfig {
    pub fn from_yaml(text: &str) -> Result<VisualizerConfig> {
        let config: VisualizerConfig = serde_yaml::from_str(text)?;
        Ok(config.sanitized())
    }

    pub fn load(path: &Path) -> Result<VisualizerConfig> {
        let text = fs::read_to_string(path).chain_err(|| format!("reading config {}", path.display()))?;
        let config = VisualizerConfig::from_yaml(&text).chain_err(|| format!("parsing config {}", path.display()))?;
        info!("loaded config from {}: {}x{} grid, block {}", path.display(), config.length, config.width,
              config.block_length);
        Ok(config)
    }

    fn sanitized(mut self) -> VisualizerConfig {
        let (length, width, coefficient) = (self.length, self.width, self.distance_coefficient);
        self.set_length(length);
        self.set_width(width);
        self.set_distance_coefficient(coefficient);
        self.block_length = self.block_length.max(1);
        for playback in &mut [&mut self.generation_playback, &mut self.search_playback] {
            playback.frames_per_second = playback.frames_per_second.max(1.0);
            playback.batch_size = playback.batch_size.max(1);
            playback.max_creations_per_tick = playback.max_creations_per_tick.max(1);
        }
        self
    }

    pub fn set_length(&mut self, length: usize) {
        self.length = length.max(2);
    }

    pub fn set_width(&mut self, width: usize) {
        self.width = width.max(2);
    }

    pub fn set_distance_coefficient(&mut self, coefficient: f32) {
        self.distance_coefficient = coefficient.max(0.0);
    }

    pub fn set_generation_fps(&mut self, fps: f32) {
        self.generation_playback.frames_per_second = fps.max(1.0);
    }

    pub fn set_search_fps(&mut self, fps: f32) {
        self.search_playback.frames_per_second = fps.max(1.0);
    }

    pub fn dimensions(&self) -> Result<GridDimensions> {
        GridDimensions::new(RowLength(self.length), ColumnLength(self.width))
    }

    pub fn block(&self) -> BlockLength {
        BlockLength(self.block_length.max(1))
    }

    /// The configured endpoints, clamped into the grid.
    pub fn endpoints(&self) -> Result<Endpoints> {
        let configured = Endpoints::new(Cartesian2DCoordinate::from(self.start), Cartesian2DCoordinate::from(self.end));
        Ok(configured.clamped(self.dimensions()?))
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config = VisualizerConfig::from_yaml("length: 41\nalgorithm: Dfs\n").unwrap();
        assert_eq!(config.length, 41);
        assert_eq!(config.width, 30);
        assert_eq!(config.algorithm, SearchAlgorithm::Dfs);
        assert_eq!(config.generation_playback, ConsumerSettings::generation());
    }

    #[test]
    fn nonsense_values_are_clamped() {
        let yaml = "length: 1\nwidth: 0\ndistance_coefficient: -2.0\nsearch_playback:\n  \
                    frames_per_second: 0.0\n  batch_size: 0\n  max_creations_per_tick: 0\n";
        let config = VisualizerConfig::from_yaml(yaml).unwrap();
        assert_eq!((config.length, config.width), (2, 2));
        assert_eq!(config.distance_coefficient, 0.0);
        assert_eq!(config.search_playback.frames_per_second, 1.0);
        assert_eq!(config.search_playback.batch_size, 1);
        assert_eq!(config.search_playback.max_creations_per_tick, 1);
        assert_eq!(config.generation_playback, ConsumerSettings::generation());
    }

    #[test]
    fn bad_yaml_is_an_error() {
        assert!(VisualizerConfig::from_yaml("length: [1, 2").is_err());
    }

    #[test]
    fn configured_endpoints_are_clamped() {
        let mut config = VisualizerConfig::default();
        config.set_length(5);
        config.set_width(4);
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.start, Cartesian2DCoordinate::new(1, 1));
        assert_eq!(endpoints.end, Cartesian2DCoordinate::new(4, 3));
    }
}
