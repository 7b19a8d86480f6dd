//! Atomic data tables.
//!
//! Atomic data is read from a JSON document ([`AtomicDataFile`]) holding
//! elements, ionization energies, levels, lines and optionally recombination
//! (zeta) factors and collision strengths. [`AtomicData`] is the processed,
//! indexed form used by the plasma and the transport:
//!
//! * every element gets one row per ionization stage up to and including the
//!   stage above the highest tabulated ionization energy. A stage without
//!   tabulated levels (usually the bare nucleus) receives a single ground level
//!   with `g = 1`.
//! * lines are sorted by descending frequency and carry the global indices of
//!   their lower and upper levels.
//! * macro-atom transitions are derived per level and grouped in blocks
//!   addressed by `block_references`.
//!
//! Energies in the file are given in eV and wavelengths in Angstrom; everything
//! in [`AtomicData`] is CGS.

use crate::constants::{ANGSTROM, C, EINSTEIN_A_COEFFICIENT, EINSTEIN_B_COEFFICIENT, EV};
use crate::errors::{RadTransError, RadTransResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementRecord {
    pub atomic_number: u32,
    pub symbol: String,
    /// Atomic mass [amu]
    pub mass: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IonRecord {
    pub atomic_number: u32,
    pub ion_number: u32,
    /// Energy needed to remove one more electron [eV]
    pub ionization_energy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelRecord {
    pub atomic_number: u32,
    pub ion_number: u32,
    pub level_number: u32,
    /// Excitation energy above the ion ground state [eV]
    pub energy: f64,
    pub g: f64,
    /// Defaults to true for ground levels and levels without downward lines.
    #[serde(default)]
    pub metastable: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineRecord {
    pub atomic_number: u32,
    pub ion_number: u32,
    pub level_number_lower: u32,
    pub level_number_upper: u32,
    /// Wavelength [Angstrom]
    pub wavelength: f64,
    pub f_lu: f64,
    /// Einstein A coefficient [1/s]. Derived from `f_lu` when absent.
    #[serde(default)]
    pub a_ul: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZetaRow {
    pub atomic_number: u32,
    /// The recombining ion, i.e. the upper stage of the ionization pair.
    pub ion_number: u32,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ZetaRecord {
    /// Temperature grid [K]
    pub temperatures: Vec<f64>,
    pub rows: Vec<ZetaRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollisionRecord {
    pub atomic_number: u32,
    pub ion_number: u32,
    pub level_number_lower: u32,
    pub level_number_upper: u32,
    /// Downward collision rate coefficient at `temperature` [cm^3 / s]
    pub c_ul: f64,
    /// Reference temperature [K]
    pub temperature: f64,
}

/// Raw atomic data as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AtomicDataFile {
    pub elements: Vec<ElementRecord>,
    pub ions: Vec<IonRecord>,
    pub levels: Vec<LevelRecord>,
    pub lines: Vec<LineRecord>,
    #[serde(default)]
    pub zeta: Option<ZetaRecord>,
    #[serde(default)]
    pub collisions: Vec<CollisionRecord>,
}

impl AtomicDataFile {
    /// Keeps only the records of the given elements.
    pub fn select_elements(&self, atomic_numbers: &[u32]) -> Self {
        let keep = |z: &u32| atomic_numbers.contains(z);
        Self {
            elements: self
                .elements
                .iter()
                .filter(|e| keep(&e.atomic_number))
                .cloned()
                .collect(),
            ions: self
                .ions
                .iter()
                .filter(|i| keep(&i.atomic_number))
                .cloned()
                .collect(),
            levels: self
                .levels
                .iter()
                .filter(|l| keep(&l.atomic_number))
                .cloned()
                .collect(),
            lines: self
                .lines
                .iter()
                .filter(|l| keep(&l.atomic_number))
                .cloned()
                .collect(),
            zeta: self.zeta.as_ref().map(|z| ZetaRecord {
                temperatures: z.temperatures.clone(),
                rows: z
                    .rows
                    .iter()
                    .filter(|r| keep(&r.atomic_number))
                    .cloned()
                    .collect(),
            }),
            collisions: self
                .collisions
                .iter()
                .filter(|c| keep(&c.atomic_number))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub atomic_number: u32,
    pub symbol: String,
    /// Atomic mass [g]
    pub mass: f64,
    /// Rows of [`AtomicData::ions`] belonging to this element.
    pub ions: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ion {
    pub atomic_number: u32,
    pub ion_number: u32,
    pub element_index: usize,
    /// Energy to reach the next stage [erg]; zero for the highest stage.
    pub ionization_energy: f64,
    /// Rows of [`AtomicData::levels`] belonging to this ion.
    pub levels: Range<usize>,
}

impl Ion {
    /// Charge of the ion in units of the elementary charge.
    pub fn charge(&self) -> f64 {
        self.ion_number as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub atomic_number: u32,
    pub ion_number: u32,
    pub level_number: u32,
    pub ion_index: usize,
    /// Excitation energy [erg]
    pub energy: f64,
    pub g: f64,
    pub metastable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub atomic_number: u32,
    pub ion_number: u32,
    pub level_number_lower: u32,
    pub level_number_upper: u32,
    pub ion_index: usize,
    pub lower_level_index: usize,
    pub upper_level_index: usize,
    /// Frequency [Hz]
    pub nu: f64,
    /// Wavelength [cm]
    pub wavelength: f64,
    pub f_lu: f64,
    pub f_ul: f64,
    pub a_ul: f64,
    pub b_lu: f64,
    pub b_ul: f64,
}

/// Kind of macro-atom transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionType {
    /// Radiative de-activation through a line (code -1)
    Emission,
    /// Internal jump to a lower level (code 0)
    InternalDown,
    /// Internal jump to a higher level (code 1)
    InternalUp,
}

impl TransitionType {
    pub fn code(&self) -> i8 {
        match self {
            TransitionType::Emission => -1,
            TransitionType::InternalDown => 0,
            TransitionType::InternalUp => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroAtomTransition {
    pub source_level: usize,
    pub destination_level: usize,
    pub transition_type: TransitionType,
    pub line_index: usize,
    /// Rate coefficient before multiplication with the radiation field terms
    pub coefficient: f64,
}

/// Macro-atom transitions grouped by source level.
///
/// Transitions of level `i` occupy `block_references[i]..block_references[i + 1]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MacroAtomData {
    pub transitions: Vec<MacroAtomTransition>,
    pub block_references: Vec<usize>,
}

impl MacroAtomData {
    fn build(levels: &[Level], lines: &[Line], include_internal: bool) -> Self {
        let mut per_level: Vec<Vec<MacroAtomTransition>> = vec![Vec::new(); levels.len()];

        for (line_index, line) in lines.iter().enumerate() {
            let lower = &levels[line.lower_level_index];
            let upper = &levels[line.upper_level_index];

            per_level[line.upper_level_index].push(MacroAtomTransition {
                source_level: line.upper_level_index,
                destination_level: line.lower_level_index,
                transition_type: TransitionType::Emission,
                line_index,
                coefficient: line.a_ul * (upper.energy - lower.energy),
            });
            if include_internal {
                per_level[line.upper_level_index].push(MacroAtomTransition {
                    source_level: line.upper_level_index,
                    destination_level: line.lower_level_index,
                    transition_type: TransitionType::InternalDown,
                    line_index,
                    coefficient: line.a_ul * lower.energy,
                });
                per_level[line.lower_level_index].push(MacroAtomTransition {
                    source_level: line.lower_level_index,
                    destination_level: line.upper_level_index,
                    transition_type: TransitionType::InternalUp,
                    line_index,
                    coefficient: line.b_lu * lower.energy,
                });
            }
        }

        let mut transitions = Vec::new();
        let mut block_references = Vec::with_capacity(levels.len() + 1);
        for block in per_level {
            block_references.push(transitions.len());
            transitions.extend(block);
        }
        block_references.push(transitions.len());

        Self {
            transitions,
            block_references,
        }
    }

    pub fn block(&self, level: usize) -> Range<usize> {
        self.block_references[level]..self.block_references[level + 1]
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Collisional coupling between two levels of one ion.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub ion_index: usize,
    pub lower_level_index: usize,
    pub upper_level_index: usize,
    pub c_ul: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Zeta {
    pub temperatures: Vec<f64>,
    /// Indexed by ion row of the recombining ion
    values: HashMap<usize, Vec<f64>>,
}

impl Zeta {
    /// Linear interpolation of zeta for the recombining ion `ion_index`.
    ///
    /// Temperatures outside the grid are clamped to its ends. Ions without
    /// tabulated values return 1, which reduces the nebular approximation to
    /// the diluted LTE ratio.
    pub fn interpolate(&self, ion_index: usize, temperature: f64) -> f64 {
        let Some(values) = self.values.get(&ion_index) else {
            return 1.0;
        };
        interpolate_linear(&self.temperatures, values, temperature)
    }
}

fn interpolate_linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    match xs.len() {
        0 => 1.0,
        1 => ys[0],
        n => {
            if x <= xs[0] {
                return ys[0];
            }
            if x >= xs[n - 1] {
                return ys[n - 1];
            }
            let upper = xs.partition_point(|&v| v < x);
            let lower = upper - 1;
            let fraction = (x - xs[lower]) / (xs[upper] - xs[lower]);
            ys[lower] + fraction * (ys[upper] - ys[lower])
        }
    }
}

/// Processed and indexed atomic data.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicData {
    pub elements: Vec<Element>,
    pub ions: Vec<Ion>,
    pub levels: Vec<Level>,
    /// Sorted by descending frequency
    pub lines: Vec<Line>,
    pub zeta: Zeta,
    pub collisions: Vec<Collision>,
    /// Emission, internal down and internal up transitions
    pub macro_atom: MacroAtomData,
    /// Emission transitions only
    pub downbranch: MacroAtomData,
    ion_lookup: HashMap<(u32, u32), usize>,
    level_lookup: HashMap<(u32, u32, u32), usize>,
    source: AtomicDataFile,
}

impl AtomicData {
    pub fn from_json_path(path: impl AsRef<Path>) -> RadTransResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file: AtomicDataFile = serde_json::from_str(&text)?;
        debug!(
            path = %path.display(),
            lines = file.lines.len(),
            levels = file.levels.len(),
            "Read atomic data"
        );
        Self::from_file_data(file)
    }

    /// Validates and indexes raw atomic data.
    pub fn from_file_data(file: AtomicDataFile) -> RadTransResult<Self> {
        let mut element_records = file.elements.clone();
        element_records.sort_by_key(|e| e.atomic_number);
        if let Some(pair) = element_records
            .windows(2)
            .find(|w| w[0].atomic_number == w[1].atomic_number)
        {
            return Err(RadTransError::AtomicData(format!(
                "element {} is listed twice",
                pair[0].atomic_number
            )));
        }

        let mut ion_energies: HashMap<(u32, u32), f64> = HashMap::new();
        for ion in &file.ions {
            if !element_records
                .iter()
                .any(|e| e.atomic_number == ion.atomic_number)
            {
                return Err(RadTransError::AtomicData(format!(
                    "ion ({}, {}) belongs to an unknown element",
                    ion.atomic_number, ion.ion_number
                )));
            }
            if ion.ion_number >= ion.atomic_number {
                return Err(RadTransError::AtomicData(format!(
                    "ion ({}, {}) cannot be ionized further",
                    ion.atomic_number, ion.ion_number
                )));
            }
            ion_energies.insert((ion.atomic_number, ion.ion_number), ion.ionization_energy * EV);
        }

        let mut level_records = file.levels.clone();
        level_records.sort_by_key(|l| (l.atomic_number, l.ion_number, l.level_number));
        for level in &level_records {
            if level.g <= 0.0 {
                return Err(RadTransError::AtomicData(format!(
                    "level ({}, {}, {}) has non-positive statistical weight",
                    level.atomic_number, level.ion_number, level.level_number
                )));
            }
            if level.energy < 0.0 {
                return Err(RadTransError::AtomicData(format!(
                    "level ({}, {}, {}) has negative energy",
                    level.atomic_number, level.ion_number, level.level_number
                )));
            }
        }

        let mut elements = Vec::with_capacity(element_records.len());
        let mut ions = Vec::new();
        let mut levels = Vec::new();
        let mut ion_lookup = HashMap::new();
        let mut level_lookup = HashMap::new();

        for (element_index, record) in element_records.iter().enumerate() {
            let z = record.atomic_number;
            let top_stage = (0..z)
                .filter(|j| ion_energies.contains_key(&(z, *j)))
                .max()
                .map_or(0, |j| j + 1);
            let ion_start = ions.len();

            for ion_number in 0..=top_stage {
                let ionization_energy = if ion_number == top_stage {
                    0.0
                } else {
                    *ion_energies.get(&(z, ion_number)).ok_or_else(|| {
                        RadTransError::AtomicData(format!(
                            "missing ionization energy for ion ({z}, {ion_number})"
                        ))
                    })?
                };
                let ion_index = ions.len();
                let level_start = levels.len();

                let records: Vec<&LevelRecord> = level_records
                    .iter()
                    .filter(|l| l.atomic_number == z && l.ion_number == ion_number)
                    .collect();
                if records.is_empty() {
                    if ion_number != top_stage {
                        return Err(RadTransError::AtomicData(format!(
                            "ion ({z}, {ion_number}) has no levels"
                        )));
                    }
                    levels.push(Level {
                        atomic_number: z,
                        ion_number,
                        level_number: 0,
                        ion_index,
                        energy: 0.0,
                        g: 1.0,
                        metastable: true,
                    });
                } else {
                    for (expected, l) in records.iter().enumerate() {
                        if l.level_number as usize != expected {
                            return Err(RadTransError::AtomicData(format!(
                                "levels of ion ({z}, {ion_number}) are not numbered consecutively from 0"
                            )));
                        }
                        levels.push(Level {
                            atomic_number: z,
                            ion_number,
                            level_number: l.level_number,
                            ion_index,
                            energy: l.energy * EV,
                            g: l.g,
                            metastable: l.metastable.unwrap_or(l.level_number == 0),
                        });
                    }
                }
                for (offset, level) in levels[level_start..].iter().enumerate() {
                    level_lookup.insert(
                        (z, ion_number, level.level_number),
                        level_start + offset,
                    );
                }

                ion_lookup.insert((z, ion_number), ion_index);
                ions.push(Ion {
                    atomic_number: z,
                    ion_number,
                    element_index,
                    ionization_energy,
                    levels: level_start..levels.len(),
                });
            }

            elements.push(Element {
                atomic_number: z,
                symbol: record.symbol.clone(),
                mass: record.mass * crate::constants::AMU,
                ions: ion_start..ions.len(),
            });
        }

        for level in &level_records {
            if !level_lookup.contains_key(&(level.atomic_number, level.ion_number, level.level_number))
            {
                return Err(RadTransError::AtomicData(format!(
                    "level ({}, {}, {}) belongs to an unknown ion",
                    level.atomic_number, level.ion_number, level.level_number
                )));
            }
        }

        let mut lines = Vec::with_capacity(file.lines.len());
        for record in &file.lines {
            let lookup = |level_number: u32| {
                level_lookup
                    .get(&(record.atomic_number, record.ion_number, level_number))
                    .copied()
                    .ok_or_else(|| {
                        RadTransError::AtomicData(format!(
                            "line references unknown level ({}, {}, {})",
                            record.atomic_number, record.ion_number, level_number
                        ))
                    })
            };
            let lower_level_index = lookup(record.level_number_lower)?;
            let upper_level_index = lookup(record.level_number_upper)?;
            let lower = &levels[lower_level_index];
            let upper = &levels[upper_level_index];
            if record.level_number_upper <= record.level_number_lower {
                return Err(RadTransError::AtomicData(format!(
                    "line ({}, {}, {} -> {}) does not go upward",
                    record.atomic_number,
                    record.ion_number,
                    record.level_number_lower,
                    record.level_number_upper
                )));
            }
            if record.wavelength <= 0.0 {
                return Err(RadTransError::AtomicData(format!(
                    "line ({}, {}, {} -> {}) has non-positive wavelength",
                    record.atomic_number,
                    record.ion_number,
                    record.level_number_lower,
                    record.level_number_upper
                )));
            }

            let wavelength = record.wavelength * ANGSTROM;
            let nu = C / wavelength;
            let g_ratio = lower.g / upper.g;
            let a_ul = record
                .a_ul
                .unwrap_or(EINSTEIN_A_COEFFICIENT * nu * nu * g_ratio * record.f_lu);
            let b_lu = EINSTEIN_B_COEFFICIENT * record.f_lu / nu;

            lines.push(Line {
                atomic_number: record.atomic_number,
                ion_number: record.ion_number,
                level_number_lower: record.level_number_lower,
                level_number_upper: record.level_number_upper,
                ion_index: lower.ion_index,
                lower_level_index,
                upper_level_index,
                nu,
                wavelength,
                f_lu: record.f_lu,
                f_ul: record.f_lu * g_ratio,
                a_ul,
                b_lu,
                b_ul: b_lu * g_ratio,
            });
        }
        lines.sort_by(|a, b| b.nu.total_cmp(&a.nu));

        // Levels without any downward line cannot decay radiatively
        let has_downward: BTreeSet<usize> = lines.iter().map(|l| l.upper_level_index).collect();
        for (index, level) in levels.iter_mut().enumerate() {
            let explicit = level_records
                .iter()
                .find(|l| {
                    l.atomic_number == level.atomic_number
                        && l.ion_number == level.ion_number
                        && l.level_number == level.level_number
                })
                .and_then(|l| l.metastable);
            if explicit.is_none() && level.level_number != 0 {
                level.metastable = !has_downward.contains(&index);
            }
        }

        let zeta = Self::build_zeta(file.zeta.as_ref(), &ion_lookup)?;

        let mut collisions = Vec::with_capacity(file.collisions.len());
        for record in &file.collisions {
            let key_lower = (record.atomic_number, record.ion_number, record.level_number_lower);
            let key_upper = (record.atomic_number, record.ion_number, record.level_number_upper);
            match (level_lookup.get(&key_lower), level_lookup.get(&key_upper)) {
                (Some(&lower), Some(&upper)) => collisions.push(Collision {
                    ion_index: levels[lower].ion_index,
                    lower_level_index: lower,
                    upper_level_index: upper,
                    c_ul: record.c_ul,
                    temperature: record.temperature,
                }),
                _ => {
                    return Err(RadTransError::AtomicData(format!(
                        "collision data references unknown levels of ion ({}, {})",
                        record.atomic_number, record.ion_number
                    )))
                }
            }
        }

        let macro_atom = MacroAtomData::build(&levels, &lines, true);
        let downbranch = MacroAtomData::build(&levels, &lines, false);

        debug!(
            elements = elements.len(),
            ions = ions.len(),
            levels = levels.len(),
            lines = lines.len(),
            transitions = macro_atom.len(),
            "Indexed atomic data"
        );

        Ok(Self {
            elements,
            ions,
            levels,
            lines,
            zeta,
            collisions,
            macro_atom,
            downbranch,
            ion_lookup,
            level_lookup,
            source: file,
        })
    }

    fn build_zeta(
        record: Option<&ZetaRecord>,
        ion_lookup: &HashMap<(u32, u32), usize>,
    ) -> RadTransResult<Zeta> {
        let Some(record) = record else {
            return Ok(Zeta {
                temperatures: Vec::new(),
                values: HashMap::new(),
            });
        };
        if record.temperatures.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RadTransError::AtomicData(
                "zeta temperature grid must be strictly increasing".to_string(),
            ));
        }
        let mut values = HashMap::new();
        for row in &record.rows {
            if row.values.len() != record.temperatures.len() {
                return Err(RadTransError::AtomicData(format!(
                    "zeta row for ion ({}, {}) has {} values for {} temperatures",
                    row.atomic_number,
                    row.ion_number,
                    row.values.len(),
                    record.temperatures.len()
                )));
            }
            match ion_lookup.get(&(row.atomic_number, row.ion_number)) {
                Some(&ion_index) => {
                    values.insert(ion_index, row.values.clone());
                }
                None => warn!(
                    atomic_number = row.atomic_number,
                    ion_number = row.ion_number,
                    "Ignoring zeta row for an ion without atomic data"
                ),
            }
        }
        Ok(Zeta {
            temperatures: record.temperatures.clone(),
            values,
        })
    }

    /// Restricts the data to the elements of a model.
    pub fn select_elements(&self, atomic_numbers: &[u32]) -> RadTransResult<Self> {
        for z in atomic_numbers {
            if !self.elements.iter().any(|e| e.atomic_number == *z) {
                return Err(RadTransError::AtomicData(format!(
                    "no atomic data for element {z}"
                )));
            }
        }
        Self::from_file_data(self.source.select_elements(atomic_numbers))
    }

    pub fn ion_index(&self, atomic_number: u32, ion_number: u32) -> Option<usize> {
        self.ion_lookup.get(&(atomic_number, ion_number)).copied()
    }

    pub fn level_index(&self, atomic_number: u32, ion_number: u32, level_number: u32) -> Option<usize> {
        self.level_lookup
            .get(&(atomic_number, ion_number, level_number))
            .copied()
    }

    pub fn element_index(&self, atomic_number: u32) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| e.atomic_number == atomic_number)
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn n_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn n_ions(&self) -> usize {
        self.ions.len()
    }

    /// Line frequencies in descending order.
    pub fn line_list_nu(&self) -> Vec<f64> {
        self.lines.iter().map(|l| l.nu).collect()
    }
}
