//! Chapter 1 optical ray engine
//!
//! A single straight ray is marched through the tissue grid each tick.
//! Skull scatters short-wavelength light, vessels absorb and heat up, and
//! upconverting nanoparticles (UCNPs) hit with near-infrared light re-emit
//! blue light around themselves. The grid is rebuilt from the layout on
//! every tick, so nothing accumulates between frames.

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::level::{GRID_HEIGHT, GRID_WIDTH, GridPos, LevelLayout, SKULL_ROWS};

/// World units per grid cell
pub const CELL_SIZE: f64 = 30.0;
/// Ray march step in world units
pub const STEP_SIZE: f64 = 5.0;
pub const MAX_STEPS: usize = 300;

/// Beam energy used for the preview while not firing
pub const IDLE_POWER: f64 = 10.0;
pub const MAX_POWER: f64 = 100.0;
pub const MAX_ANGLE: f64 = 45.0;

pub const BASELINE_TEMPERATURE: f64 = 37.0;
/// Any cell hotter than this while firing is thermal damage
pub const THERMAL_LIMIT: f64 = 42.0;
/// Target activation per unit of blue intensity
pub const ACTIVATION_GAIN: f64 = 2.5;
pub const FULL_ACTIVATION: f64 = 100.0;

/// UCNPs available per level
pub const NANOPARTICLE_SUPPLY: usize = 3;
const UCNP_MIN_ENERGY: f64 = 5.0;
const UCNP_CONVERSION: f64 = 0.8;
const UCNP_RADIUS: f64 = 3.5;
const UCNP_VESSEL_HEATING: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    Empty,
    Skull,
    Tissue,
    Vessel,
    Target,
    Nanoparticle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub pos: GridPos,
    pub kind: CellKind,
    /// Blue (473nm) intensity
    pub short_intensity: f64,
    /// Near-infrared (980nm) intensity
    pub nir_intensity: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WavelengthClass {
    /// 473nm blue
    Short,
    /// 980nm near-infrared
    #[default]
    NearInfrared,
}

/// Laser settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamControls {
    /// Degrees off vertical, positive to the right
    pub angle: f64,
    pub power: f64,
    pub wavelength: WavelengthClass,
}

impl Default for BeamControls {
    fn default() -> Self {
        Self {
            angle: 0.0,
            power: 50.0,
            wavelength: WavelengthClass::NearInfrared,
        }
    }
}

impl BeamControls {
    pub fn new(angle: f64, power: f64, wavelength: WavelengthClass) -> Self {
        Self {
            angle: angle.clamp(-MAX_ANGLE, MAX_ANGLE),
            power: power.clamp(0.0, MAX_POWER),
            wavelength,
        }
    }
}

/// One tick of the optical simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalFrame {
    /// Row-major, `GRID_WIDTH * GRID_HEIGHT` cells
    pub cells: Vec<Cell>,
    /// Ray sample points in world units
    pub path: Vec<DVec2>,
    pub max_temperature: f64,
    pub target_activation: f64,
}

impl OpticalFrame {
    /// Cells at rest, no light
    pub fn baseline(layout: &LevelLayout, nanoparticles: &[GridPos]) -> Self {
        Self {
            cells: build_cells(layout, nanoparticles),
            path: Vec::new(),
            max_temperature: BASELINE_TEMPERATURE,
            target_activation: 0.0,
        }
    }

    pub fn cell(&self, pos: GridPos) -> Option<&Cell> {
        if pos.in_grid() {
            self.cells.get(pos.index())
        } else {
            None
        }
    }
}

/// Terminal result of firing the laser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpticalOutcome {
    ThermalDamage,
    TargetActivated,
}

impl OpticalOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            OpticalOutcome::ThermalDamage => "thermal damage",
            OpticalOutcome::TargetActivated => "target activated",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            OpticalOutcome::ThermalDamage => "FAILURE: Vessel overheated! Thermal damage detected.",
            OpticalOutcome::TargetActivated => {
                "SUCCESS: Target Activated! Neural link established."
            }
        }
    }
}

impl fmt::Display for OpticalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Overheating wins over activation when both happen on the same tick
pub fn classify(frame: &OpticalFrame) -> Option<OpticalOutcome> {
    if frame.max_temperature > THERMAL_LIMIT {
        Some(OpticalOutcome::ThermalDamage)
    } else if frame.target_activation >= FULL_ACTIVATION {
        Some(OpticalOutcome::TargetActivated)
    } else {
        None
    }
}

fn build_cells(layout: &LevelLayout, nanoparticles: &[GridPos]) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(GRID_WIDTH * GRID_HEIGHT);
    for y in 0..GRID_HEIGHT {
        for x in 0..GRID_WIDTH {
            let pos = GridPos::new(x, y);
            let kind = if pos == layout.target {
                CellKind::Target
            } else if layout.is_vessel(pos) {
                CellKind::Vessel
            } else if nanoparticles.contains(&pos) {
                CellKind::Nanoparticle
            } else if y < SKULL_ROWS {
                CellKind::Skull
            } else {
                CellKind::Tissue
            };
            cells.push(Cell {
                pos,
                kind,
                short_intensity: 0.0,
                nir_intensity: 0.0,
                temperature: BASELINE_TEMPERATURE,
            });
        }
    }
    cells
}

/// Re-emit converted energy as blue light into the UCNP's neighbourhood
fn upconvert(cells: &mut [Cell], center: GridPos, power: f64) {
    let reach = UCNP_RADIUS.floor() as i64;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let nx = center.x as i64 + dx;
            let ny = center.y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= GRID_WIDTH as i64 || ny >= GRID_HEIGHT as i64 {
                continue;
            }
            let dist = ((dx * dx + dy * dy) as f64).sqrt();
            if dist > UCNP_RADIUS {
                continue;
            }
            let deposited = power / (1.0 + 0.5 * dist);
            let cell = &mut cells[GridPos::new(nx as usize, ny as usize).index()];
            cell.short_intensity += deposited;
            if cell.kind == CellKind::Vessel {
                cell.temperature += UCNP_VESSEL_HEATING * deposited;
            }
        }
    }
}

/// March the beam through a freshly built grid
///
/// `firing` selects the beam power; otherwise a low-power preview ray is
/// traced so the player can aim.
pub fn trace(
    layout: &LevelLayout,
    nanoparticles: &[GridPos],
    controls: &BeamControls,
    firing: bool,
) -> OpticalFrame {
    let mut cells = build_cells(layout, nanoparticles);
    let mut path = Vec::new();

    let theta = controls.angle.to_radians();
    let dir = DVec2::new(theta.sin(), theta.cos());
    let mut pos = DVec2::new(
        layout.source_column as f64 * CELL_SIZE + CELL_SIZE / 2.0,
        0.0,
    );
    let mut energy = if firing { controls.power } else { IDLE_POWER };
    let width = GRID_WIDTH as f64 * CELL_SIZE;
    let height = GRID_HEIGHT as f64 * CELL_SIZE;

    for _ in 0..MAX_STEPS {
        pos += dir * STEP_SIZE;
        if pos.x < 0.0 || pos.x >= width || pos.y < 0.0 || pos.y >= height {
            break;
        }
        path.push(pos);

        let grid = GridPos::new(
            (pos.x / CELL_SIZE).floor() as usize,
            (pos.y / CELL_SIZE).floor() as usize,
        );
        let cell = &mut cells[grid.index()];

        if cell.kind == CellKind::Skull && controls.wavelength == WavelengthClass::Short {
            energy *= 0.5;
            cell.temperature += 0.1 * energy;
        }
        if cell.kind == CellKind::Vessel {
            energy *= 0.8;
            cell.temperature += 0.5 * energy;
        }

        match controls.wavelength {
            WavelengthClass::Short => {
                cell.short_intensity = cell.short_intensity.max(energy);
                energy *= 0.90;
            }
            WavelengthClass::NearInfrared => {
                cell.nir_intensity = cell.nir_intensity.max(energy);
                energy *= 0.99;
            }
        }

        if cell.kind == CellKind::Nanoparticle
            && controls.wavelength == WavelengthClass::NearInfrared
            && energy > UCNP_MIN_ENERGY
        {
            upconvert(&mut cells, grid, UCNP_CONVERSION * energy);
            energy *= 0.8;
        }

        if energy < 1.0 {
            break;
        }
    }

    let max_temperature = cells
        .iter()
        .map(|c| c.temperature)
        .fold(BASELINE_TEMPERATURE, f64::max);
    let target_activation = cells
        .get(layout.target.index())
        .map(|c| (ACTIVATION_GAIN * c.short_intensity).min(FULL_ACTIVATION))
        .unwrap_or(0.0);

    OpticalFrame {
        cells,
        path,
        max_temperature,
        target_activation,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PuzzleStatus {
    #[default]
    Idle,
    Success,
    Failed,
}

pub const BRIEFING: &str = "MISSION: Use UCNPs to scatter light around obstacles.";

/// Chapter 1 puzzle: layout, placed nanoparticles, laser and last frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticsPuzzle {
    layout: LevelLayout,
    nanoparticles: Vec<GridPos>,
    controls: BeamControls,
    firing: bool,
    status: PuzzleStatus,
    frame: OpticalFrame,
}

impl Default for OpticsPuzzle {
    fn default() -> Self {
        Self::new(LevelLayout::default())
    }
}

impl OpticsPuzzle {
    pub fn new(layout: LevelLayout) -> Self {
        let controls = BeamControls::default();
        let frame = trace(&layout, &[], &controls, false);
        Self {
            layout,
            nanoparticles: Vec::new(),
            controls,
            firing: false,
            status: PuzzleStatus::Idle,
            frame,
        }
    }

    pub fn layout(&self) -> &LevelLayout {
        &self.layout
    }

    pub fn nanoparticles(&self) -> &[GridPos] {
        &self.nanoparticles
    }

    pub fn remaining_nanoparticles(&self) -> usize {
        NANOPARTICLE_SUPPLY - self.nanoparticles.len()
    }

    pub fn controls(&self) -> &BeamControls {
        &self.controls
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    pub fn status(&self) -> PuzzleStatus {
        self.status
    }

    pub fn frame(&self) -> &OpticalFrame {
        &self.frame
    }

    pub fn message(&self) -> &'static str {
        match self.status {
            PuzzleStatus::Idle => BRIEFING,
            PuzzleStatus::Success => OpticalOutcome::TargetActivated.message(),
            PuzzleStatus::Failed => OpticalOutcome::ThermalDamage.message(),
        }
    }

    /// Place a UCNP on a tissue cell or take one back
    ///
    /// Returns whether anything changed. Refused while firing and once the
    /// target has been activated.
    pub fn toggle_nanoparticle(&mut self, pos: GridPos) -> bool {
        if self.firing || self.status == PuzzleStatus::Success || !pos.in_grid() {
            return false;
        }
        if let Some(i) = self.nanoparticles.iter().position(|p| *p == pos) {
            self.nanoparticles.swap_remove(i);
        } else {
            let on_tissue = self
                .frame
                .cell(pos)
                .is_some_and(|c| c.kind == CellKind::Tissue);
            if !on_tissue || self.remaining_nanoparticles() == 0 {
                return false;
            }
            self.nanoparticles.push(pos);
        }
        self.refresh();
        true
    }

    pub fn set_controls(&mut self, controls: BeamControls) {
        self.controls = BeamControls::new(controls.angle, controls.power, controls.wavelength);
        if !self.firing {
            self.refresh();
        }
    }

    /// Begin firing at full power; needs an idle puzzle
    pub fn start_firing(&mut self) -> bool {
        if self.status != PuzzleStatus::Idle {
            return false;
        }
        self.firing = true;
        true
    }

    pub fn stop_firing(&mut self) {
        self.firing = false;
        self.refresh();
    }

    /// Clear the frame and status, keeping placements
    pub fn reset_attempt(&mut self) {
        self.firing = false;
        self.status = PuzzleStatus::Idle;
        self.frame = OpticalFrame::baseline(&self.layout, &self.nanoparticles);
    }

    /// Trace one frame; while firing, classify it
    pub fn tick(&mut self) -> Option<OpticalOutcome> {
        self.frame = trace(&self.layout, &self.nanoparticles, &self.controls, self.firing);
        if !self.firing {
            return None;
        }

        let outcome = classify(&self.frame)?;
        self.firing = false;
        self.status = match outcome {
            OpticalOutcome::ThermalDamage => PuzzleStatus::Failed,
            OpticalOutcome::TargetActivated => PuzzleStatus::Success,
        };
        log::info!(
            "Optics attempt ended: {} (max {:.1}C, activation {:.0}%)",
            outcome,
            self.frame.max_temperature,
            self.frame.target_activation
        );
        Some(outcome)
    }

    fn refresh(&mut self) {
        self.frame = trace(&self.layout, &self.nanoparticles, &self.controls, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nir(power: f64) -> BeamControls {
        BeamControls::new(0.0, power, WavelengthClass::NearInfrared)
    }

    fn lit_columns(frame: &OpticalFrame) -> Vec<usize> {
        frame
            .cells
            .iter()
            .filter(|c| c.nir_intensity > 0.0 || c.short_intensity > 0.0)
            .map(|c| c.pos.x)
            .collect()
    }

    #[test]
    fn test_straight_ray_stays_in_column() {
        let layout = LevelLayout::default();
        let frame = trace(&layout, &[], &nir(100.0), true);
        assert!(!frame.path.is_empty());
        assert!(lit_columns(&frame).iter().all(|&x| x == layout.source_column));
        assert!(
            frame
                .path
                .iter()
                .all(|p| (p.x - (10.0 * CELL_SIZE + CELL_SIZE / 2.0)).abs() < 1e-9)
        );
    }

    #[test]
    fn test_angled_ray_drifts_right() {
        let layout = LevelLayout::default();
        let controls = BeamControls::new(30.0, 100.0, WavelengthClass::NearInfrared);
        let frame = trace(&layout, &[], &controls, true);
        assert!(lit_columns(&frame).iter().any(|&x| x > layout.source_column));
        assert!(lit_columns(&frame).iter().all(|&x| x >= layout.source_column));
    }

    #[test]
    fn test_controls_clamped() {
        let controls = BeamControls::new(-80.0, 140.0, WavelengthClass::Short);
        assert_eq!(controls.angle, -45.0);
        assert_eq!(controls.power, 100.0);
    }

    #[test]
    fn test_blue_light_scattered_by_skull() {
        let layout = LevelLayout::default();
        let controls = BeamControls::new(0.0, 100.0, WavelengthClass::Short);
        let frame = trace(&layout, &[], &controls, true);
        // Halved on every skull step, the beam dies in the skull and burns it
        assert_eq!(frame.target_activation, 0.0);
        assert!(frame.path.len() < 20);
        assert_eq!(classify(&frame), Some(OpticalOutcome::ThermalDamage));
    }

    #[test]
    fn test_nanoparticle_next_to_target_activates() {
        let layout = LevelLayout::default();
        let ucnp = [GridPos::new(10, 11)];
        let frame = trace(&layout, &ucnp, &nir(100.0), true);
        assert_eq!(frame.target_activation, 100.0);
        assert_eq!(classify(&frame), Some(OpticalOutcome::TargetActivated));
    }

    #[test]
    fn test_vessel_in_path_overheats() {
        let layout = LevelLayout {
            vessels: vec![GridPos::new(10, 5)],
            ..LevelLayout::default()
        };
        let frame = trace(&layout, &[], &nir(100.0), true);
        assert!(frame.max_temperature > THERMAL_LIMIT);
        assert_eq!(classify(&frame), Some(OpticalOutcome::ThermalDamage));
    }

    #[test]
    fn test_idle_preview_uses_low_power() {
        let layout = LevelLayout {
            vessels: vec![GridPos::new(10, 5)],
            ..LevelLayout::default()
        };
        let preview = trace(&layout, &[], &nir(100.0), false);
        let firing = trace(&layout, &[], &nir(100.0), true);
        assert!(preview.max_temperature < firing.max_temperature);
        let entry = preview.cell(GridPos::new(10, 0)).map(|c| c.nir_intensity);
        assert_eq!(entry, Some(IDLE_POWER));
    }

    #[test]
    fn test_frame_rebuilt_every_tick() {
        let mut puzzle = OpticsPuzzle::default();
        puzzle.set_controls(nir(100.0));
        assert!(puzzle.start_firing());
        puzzle.tick();
        let first = puzzle.frame().clone();
        puzzle.tick();
        assert_eq!(&first, puzzle.frame());
    }

    #[test]
    fn test_puzzle_success_stops_firing() {
        let mut puzzle = OpticsPuzzle::default();
        assert!(puzzle.toggle_nanoparticle(GridPos::new(10, 11)));
        puzzle.set_controls(nir(100.0));
        assert!(puzzle.start_firing());

        assert_eq!(puzzle.tick(), Some(OpticalOutcome::TargetActivated));
        assert_eq!(puzzle.status(), PuzzleStatus::Success);
        assert!(!puzzle.is_firing());
        // Locked after success
        assert!(!puzzle.toggle_nanoparticle(GridPos::new(5, 5)));
        assert!(!puzzle.start_firing());
    }

    #[test]
    fn test_puzzle_failure_and_reset_attempt() {
        let layout = LevelLayout {
            vessels: vec![GridPos::new(10, 5)],
            ..LevelLayout::default()
        };
        let mut puzzle = OpticsPuzzle::new(layout);
        assert!(puzzle.toggle_nanoparticle(GridPos::new(3, 8)));
        puzzle.set_controls(nir(100.0));
        puzzle.start_firing();

        assert_eq!(puzzle.tick(), Some(OpticalOutcome::ThermalDamage));
        assert_eq!(puzzle.status(), PuzzleStatus::Failed);
        assert!(!puzzle.is_firing());

        puzzle.reset_attempt();
        assert_eq!(puzzle.status(), PuzzleStatus::Idle);
        assert_eq!(puzzle.frame().target_activation, 0.0);
        assert_eq!(puzzle.frame().max_temperature, BASELINE_TEMPERATURE);
        assert_eq!(puzzle.nanoparticles(), &[GridPos::new(3, 8)]);
    }

    #[test]
    fn test_nanoparticle_placement_rules() {
        let mut puzzle = OpticsPuzzle::default();
        // Skull and target are not tissue
        assert!(!puzzle.toggle_nanoparticle(GridPos::new(4, 0)));
        assert!(!puzzle.toggle_nanoparticle(GridPos::new(10, 12)));

        for x in 2..5 {
            assert!(puzzle.toggle_nanoparticle(GridPos::new(x, 6)));
        }
        assert_eq!(puzzle.remaining_nanoparticles(), 0);
        assert!(!puzzle.toggle_nanoparticle(GridPos::new(6, 6)));

        // Returning one frees the slot
        assert!(puzzle.toggle_nanoparticle(GridPos::new(3, 6)));
        assert_eq!(puzzle.remaining_nanoparticles(), 1);

        puzzle.start_firing();
        assert!(!puzzle.toggle_nanoparticle(GridPos::new(6, 6)));
    }

    #[test]
    fn test_idle_tick_never_classifies() {
        let mut puzzle = OpticsPuzzle::default();
        puzzle.toggle_nanoparticle(GridPos::new(10, 11));
        puzzle.set_controls(nir(100.0));
        assert_eq!(puzzle.tick(), None);
        assert_eq!(puzzle.status(), PuzzleStatus::Idle);
    }
}
