//! Storage layout rules: which partition file every allele row lands in.
//!
//! A dataset is split by up to four keys:
//!
//! - `region_bin`: `{chrom}_{position / region_length}`; chromosomes outside
//!   the configured list collapse into `other_{bin}`.
//! - `family_bin`: SHA-256 of the family id modulo `family_bin_size` (family
//!   rows only).
//! - `frequency_bin`: `0` seen as de novo, `1` ultra-rare, `2` rare, `3`
//!   common.
//! - `coding_bin`: `1` when any effect type of the allele is coding.
//!
//! Each key is enabled by its own section of the `_PARTITION_DESCRIPTION`
//! TOML sidecar.

use std::collections::BTreeMap;
use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use hashbrown::HashSet;
use itertools::Itertools;
use polars::prelude::DataType;
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};

use crate::data_structs::{
    FamilyAllele,
    Region,
    SummaryAllele,
};
use crate::errors::{
    StorageError,
    StorageResult,
};

/// File name of the descriptor sidecar at the dataset root.
pub const PARTITION_DESCRIPTION_FILE: &str = "_PARTITION_DESCRIPTION";

/// Number of frequency bins.
pub const FREQUENCY_BINS: u8 = 4;
/// Number of coding bins.
pub const CODING_BINS: u8 = 2;

pub const REGION_BIN: &str = "region_bin";
pub const FAMILY_BIN: &str = "family_bin";
pub const FREQUENCY_BIN: &str = "frequency_bin";
pub const CODING_BIN: &str = "coding_bin";

/// Ordered `(name, value)` pairs identifying one partition.
pub type Partition = Vec<(String, String)>;

/// Chromosome lengths keyed by chromosome name.
pub type ChromLengths = BTreeMap<String, u64>;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    Str(String),
    List(Vec<String>),
}

/// Accepts both `"a, b"` and `["a", "b"]`.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>, {
    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::Str(value) => {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        },
        StringOrList::List(values) => values,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBinConfig {
    #[serde(deserialize_with = "string_or_list")]
    pub chromosomes:   Vec<String>,
    pub region_length: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBinConfig {
    pub rare_boundary: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingBinConfig {
    #[serde(deserialize_with = "string_or_list")]
    pub coding_effect_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyBinConfig {
    pub family_bin_size: u64,
}

/// Partitioning scheme of a dataset. Loaded once per storage instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region_bin:    Option<RegionBinConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frequency_bin: Option<FrequencyBinConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coding_bin:    Option<CodingBinConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    family_bin:    Option<FamilyBinConfig>,
}

impl PartitionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region_bin(
        mut self,
        chromosomes: Vec<String>,
        region_length: u64,
    ) -> Self {
        self.region_bin = Some(RegionBinConfig {
            chromosomes,
            region_length,
        });
        self
    }

    pub fn with_frequency_bin(
        mut self,
        rare_boundary: f64,
    ) -> Self {
        self.frequency_bin = Some(FrequencyBinConfig { rare_boundary });
        self
    }

    pub fn with_coding_bin(
        mut self,
        coding_effect_types: Vec<String>,
    ) -> Self {
        self.coding_bin = Some(CodingBinConfig {
            coding_effect_types,
        });
        self
    }

    pub fn with_family_bin(
        mut self,
        family_bin_size: u64,
    ) -> Self {
        self.family_bin = Some(FamilyBinConfig { family_bin_size });
        self
    }

    /// Parses the TOML sidecar content. Empty content yields a descriptor
    /// without partitions.
    pub fn parse(content: &str) -> StorageResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let descriptor: Self = toml::from_str(content).map_err(|e| {
            StorageError::Configuration(format!("malformed partition description: {}", e))
        })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> StorageResult<()> {
        if let Some(region) = &self.region_bin {
            if region.region_length == 0 {
                return Err(StorageError::Configuration(
                    "region_length must be positive".into(),
                ));
            }
        }
        if let Some(family) = &self.family_bin {
            if family.family_bin_size == 0 {
                return Err(StorageError::Configuration(
                    "family_bin_size must be positive".into(),
                ));
            }
        }
        if let Some(frequency) = &self.frequency_bin {
            if frequency.rare_boundary.is_nan() || frequency.rare_boundary <= 0.0 {
                return Err(StorageError::Configuration(format!(
                    "rare_boundary must be positive, got {}",
                    frequency.rare_boundary
                )));
            }
        }
        Ok(())
    }

    pub fn serialize(&self) -> StorageResult<String> {
        toml::to_string(self).map_err(|e| {
            StorageError::Configuration(format!("can not serialize partition description: {}", e))
        })
    }

    pub fn read_sidecar(root: &Path) -> StorageResult<Self> {
        let path = root.join(PARTITION_DESCRIPTION_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            StorageError::Configuration(format!("can not read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn write_sidecar(
        &self,
        root: &Path,
    ) -> StorageResult<()> {
        let path = root.join(PARTITION_DESCRIPTION_FILE);
        fs::create_dir_all(root).map_err(|e| StorageError::partial_write(root, e))?;
        fs::write(&path, self.serialize()?).map_err(|e| StorageError::partial_write(&path, e))
    }

    pub fn has_region_bins(&self) -> bool {
        self.region_bin
            .as_ref()
            .map_or(false, |r| r.region_length > 0 && !r.chromosomes.is_empty())
    }

    pub fn has_family_bins(&self) -> bool {
        self.family_bin
            .as_ref()
            .map_or(false, |f| f.family_bin_size > 0)
    }

    pub fn has_coding_bins(&self) -> bool {
        self.coding_bin
            .as_ref()
            .map_or(false, |c| !c.coding_effect_types.is_empty())
    }

    pub fn has_frequency_bins(&self) -> bool {
        self.frequency_bin
            .as_ref()
            .map_or(false, |f| f.rare_boundary > 0.0)
    }

    pub fn has_partitions(&self) -> bool {
        self.has_region_bins()
            || self.has_frequency_bins()
            || self.has_coding_bins()
            || self.has_family_bins()
    }

    pub fn chromosomes(&self) -> &[String] {
        self.region_bin
            .as_ref()
            .map(|r| r.chromosomes.as_slice())
            .unwrap_or_default()
    }

    pub fn region_length(&self) -> u64 {
        self.region_bin
            .as_ref()
            .map_or(0, |r| r.region_length)
    }

    pub fn family_bin_size(&self) -> u64 {
        self.family_bin
            .as_ref()
            .map_or(0, |f| f.family_bin_size)
    }

    pub fn rare_boundary(&self) -> f64 {
        self.frequency_bin
            .as_ref()
            .map_or(0.0, |f| f.rare_boundary)
    }

    pub fn coding_effect_types(&self) -> &[String] {
        self.coding_bin
            .as_ref()
            .map(|c| c.coding_effect_types.as_slice())
            .unwrap_or_default()
    }

    pub fn is_coding(
        &self,
        effect_type: &str,
    ) -> bool {
        self.coding_effect_types()
            .iter()
            .any(|t| t == effect_type)
    }

    pub fn make_region_bin(
        &self,
        chrom: &str,
        position: u64,
    ) -> Option<String> {
        if !self.has_region_bins() {
            return None;
        }
        let bin = position / self.region_length();
        if self.chromosomes().iter().any(|c| c == chrom) {
            Some(format!("{}_{}", chrom, bin))
        }
        else {
            Some(format!("other_{}", bin))
        }
    }

    pub fn make_family_bin(
        &self,
        family_id: &str,
    ) -> Option<u64> {
        if !self.has_family_bins() {
            return None;
        }
        let size = self.family_bin_size() as u128;
        let digest = Sha256::digest(family_id.as_bytes());
        let bin = digest
            .iter()
            .fold(0u128, |acc, byte| (acc * 256 + *byte as u128) % size);
        Some(bin as u64)
    }

    pub fn make_coding_bin<'a, I>(
        &self,
        effect_types: I,
    ) -> Option<u8>
    where
        I: IntoIterator<Item = &'a str>, {
        if !self.has_coding_bins() {
            return None;
        }
        let coding: HashSet<&str> = self
            .coding_effect_types()
            .iter()
            .map(String::as_str)
            .collect();
        Some(
            effect_types
                .into_iter()
                .any(|e| coding.contains(e))
                .into(),
        )
    }

    /// Missing counts are treated as zero, i.e. ultra-rare.
    pub fn make_frequency_bin(
        &self,
        allele_count: Option<i64>,
        allele_freq: Option<f64>,
        is_denovo: bool,
    ) -> u8 {
        if is_denovo {
            0
        }
        else if allele_count.unwrap_or(0) <= 1 {
            1
        }
        else if allele_freq.unwrap_or(0.0) <= self.rare_boundary() {
            2
        }
        else {
            3
        }
    }

    fn frequency_coding_partition(
        &self,
        allele: &SummaryAllele,
        seen_as_denovo: bool,
    ) -> Partition {
        let mut result = Partition::new();
        if self.has_frequency_bins() {
            let bin = self.make_frequency_bin(
                allele
                    .get_attribute("af_allele_count")
                    .and_then(|v| v.as_i64()),
                allele.get_real("af_allele_freq"),
                seen_as_denovo,
            );
            result.push((FREQUENCY_BIN.into(), bin.to_string()));
        }
        if self.has_coding_bins() {
            let bin = if allele.is_reference_allele() {
                Some(0)
            }
            else {
                self.make_coding_bin(allele.effect_types())
            };
            result.push((CODING_BIN.into(), bin.unwrap_or(0).to_string()));
        }
        result
    }

    /// Partition of a summary allele row: region, frequency, coding.
    pub fn summary_partition(
        &self,
        allele: &SummaryAllele,
        seen_as_denovo: bool,
    ) -> Partition {
        let mut result = Partition::new();
        if let Some(bin) = self.make_region_bin(allele.chromosome(), allele.position() as u64) {
            result.push((REGION_BIN.into(), bin));
        }
        result.extend(self.frequency_coding_partition(allele, seen_as_denovo));
        result
    }

    /// Partition of a family allele row: region, family, frequency, coding.
    pub fn family_partition(
        &self,
        allele: &FamilyAllele<'_>,
        seen_as_denovo: bool,
    ) -> Partition {
        let summary = allele.summary_allele();
        let mut result = Partition::new();
        if let Some(bin) = self.make_region_bin(summary.chromosome(), summary.position() as u64) {
            result.push((REGION_BIN.into(), bin));
        }
        if let Some(bin) = self.make_family_bin(allele.family_id()) {
            result.push((FAMILY_BIN.into(), bin.to_string()));
        }
        result.extend(self.frequency_coding_partition(summary, seen_as_denovo));
        result
    }

    /// Partition columns stored on summary rows with their types.
    pub fn dataset_summary_partition(&self) -> Vec<(&'static str, DataType)> {
        let mut result = Vec::new();
        if self.has_region_bins() {
            result.push((REGION_BIN, DataType::String));
        }
        if self.has_frequency_bins() {
            result.push((FREQUENCY_BIN, DataType::Int8));
        }
        if self.has_coding_bins() {
            result.push((CODING_BIN, DataType::Int8));
        }
        result
    }

    /// Partition columns stored on family rows with their types.
    pub fn dataset_family_partition(&self) -> Vec<(&'static str, DataType)> {
        let mut result = self.dataset_summary_partition();
        if self.has_family_bins() {
            let at = usize::from(self.has_region_bins());
            result.insert(at, (FAMILY_BIN, DataType::Int32));
        }
        result
    }

    /// Region bins overlapped by `region`, or `None` when the region can not
    /// be bounded (open end on a chromosome of unknown length).
    pub fn region_to_bins(
        &self,
        region: &Region,
        chrom_lengths: &ChromLengths,
    ) -> Option<Vec<String>> {
        if !self.has_region_bins() {
            return None;
        }
        let length = self.region_length();
        let start = region.start.unwrap_or(0) as u64;
        let stop = match (region.stop, chrom_lengths.get(&region.chrom)) {
            (Some(stop), Some(chrom_len)) => (stop as u64).min(chrom_len.saturating_sub(1)),
            (Some(stop), None) => stop as u64,
            (None, Some(chrom_len)) => chrom_len.saturating_sub(1),
            (None, None) => return None,
        };
        let stop = stop.max(start);
        Some(
            (start / length..=stop / length)
                .filter_map(|bin| self.make_region_bin(&region.chrom, bin * length))
                .unique()
                .collect(),
        )
    }

    fn chrom_region_bins(
        &self,
        chrom: &str,
        chrom_len: u64,
    ) -> Vec<String> {
        let bins = chrom_len.div_ceil(self.region_length()).max(1);
        (0..bins).map(|i| format!("{}_{}", chrom, i)).collect()
    }

    /// Every region bin of the genome.
    pub fn make_all_region_bins(
        &self,
        chrom_lengths: &ChromLengths,
    ) -> StorageResult<Vec<String>> {
        if !self.has_region_bins() {
            return Ok(Vec::new());
        }
        let mut bins = Vec::new();
        for chrom in self.chromosomes() {
            let chrom_len = chrom_lengths.get(chrom).ok_or_else(|| {
                StorageError::Configuration(format!(
                    "partition chromosome {} not found in chromosome lengths",
                    chrom
                ))
            })?;
            bins.extend(self.chrom_region_bins(chrom, *chrom_len));
        }
        let other_max = chrom_lengths
            .iter()
            .filter(|(chrom, _)| !self.chromosomes().contains(*chrom))
            .map(|(_, len)| *len)
            .max();
        if let Some(other_max) = other_max {
            bins.extend(self.chrom_region_bins("other", other_max));
        }
        Ok(bins)
    }

    /// All summary and family partitions of a genome.
    pub fn build_summary_partitions(
        &self,
        chrom_lengths: &ChromLengths,
    ) -> StorageResult<(Vec<Partition>, Vec<Partition>)> {
        let regions = self
            .make_all_region_bins(chrom_lengths)?
            .into_iter()
            .map(|bin| (REGION_BIN.to_string(), bin))
            .collect_vec();
        let families = (0..self.family_bin_size())
            .map(|bin| (FAMILY_BIN.to_string(), bin.to_string()))
            .collect_vec();
        let frequencies = if self.has_frequency_bins() {
            (0..FREQUENCY_BINS)
                .map(|bin| (FREQUENCY_BIN.to_string(), bin.to_string()))
                .collect_vec()
        }
        else {
            Vec::new()
        };
        let codings = if self.has_coding_bins() {
            (0..CODING_BINS)
                .map(|bin| (CODING_BIN.to_string(), bin.to_string()))
                .collect_vec()
        }
        else {
            Vec::new()
        };

        let summary = [&regions, &frequencies, &codings]
            .into_iter()
            .fold(Vec::new(), |acc, keys| add_product(acc, keys));
        let family = [&regions, &families, &frequencies, &codings]
            .into_iter()
            .fold(Vec::new(), |acc, keys| add_product(acc, keys));
        Ok((summary, family))
    }

    /// `root/name=value/...` directory of a partition.
    pub fn partition_directory(
        root: &Path,
        partition: &Partition,
    ) -> PathBuf {
        partition
            .iter()
            .fold(root.to_path_buf(), |path, (name, value)| {
                path.join(format!("{}={}", name, value))
            })
    }

    /// `{prefix}_{name}_{value}..._bucket_index_{bucket:06}.parquet`
    pub fn partition_filename(
        prefix: &str,
        partition: &Partition,
        bucket_index: Option<u32>,
    ) -> String {
        let mut parts = vec![prefix.to_string()];
        parts.extend(
            partition
                .iter()
                .map(|(name, value)| format!("{}_{}", name, value)),
        );
        if let Some(bucket) = bucket_index {
            parts.push(format!("bucket_index_{:06}", bucket));
        }
        format!("{}.parquet", parts.join("_"))
    }

    /// Reads the partition back from a path relative to the dataset kind
    /// directory, e.g. `region_bin=chr1_0/frequency_bin=1/x.parquet`.
    pub fn path_to_partitions(path: &Path) -> StorageResult<Partition> {
        let mut parts = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect_vec();
        if parts.last().map_or(false, |p| p.ends_with(".parquet")) {
            parts.pop();
        }
        parts
            .into_iter()
            .map(|part| {
                part.split_once('=')
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .ok_or_else(|| {
                        StorageError::Configuration(format!(
                            "path {} contains non-partition directory {}",
                            path.display(),
                            part
                        ))
                    })
            })
            .collect()
    }
}

fn add_product(
    names: Vec<Partition>,
    to_add: &[(String, String)],
) -> Vec<Partition> {
    if to_add.is_empty() {
        return names;
    }
    if names.is_empty() {
        return to_add.iter().map(|key| vec![key.clone()]).collect();
    }
    names
        .iter()
        .cartesian_product(to_add.iter())
        .map(|(name, key)| {
            let mut partition = name.clone();
            partition.push(key.clone());
            partition
        })
        .collect()
}
