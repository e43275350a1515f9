//! Haplotype extraction and tab-delimited output.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::WriteError;
use crate::tables::TreeSequence;

/// Genotypes in the engine's orientation: one row per site,
/// one column per sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenotypeMatrix {
    num_sites: usize,
    num_samples: usize,
    genotypes: Vec<u8>,
}

impl GenotypeMatrix {
    pub fn new(num_sites: usize, num_samples: usize, genotypes: Vec<u8>) -> Option<Self> {
        if genotypes.len() == num_sites * num_samples {
            Some(Self::from_sites(num_sites, num_samples, genotypes))
        } else {
            None
        }
    }

    pub(crate) fn from_sites(num_sites: usize, num_samples: usize, genotypes: Vec<u8>) -> Self {
        debug_assert_eq!(genotypes.len(), num_sites * num_samples);
        Self {
            num_sites,
            num_samples,
            genotypes,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn site(&self, site: usize) -> &[u8] {
        &self.genotypes[site * self.num_samples..(site + 1) * self.num_samples]
    }

    /// Samples as rows, sites as columns.
    pub fn transpose(&self) -> HaplotypeMatrix {
        let mut haplotypes = vec![0; self.genotypes.len()];
        for site in 0..self.num_sites {
            for (sample, g) in self.site(site).iter().enumerate() {
                haplotypes[sample * self.num_sites + site] = *g;
            }
        }
        HaplotypeMatrix {
            num_samples: self.num_samples,
            num_sites: self.num_sites,
            haplotypes,
        }
    }
}

/// One row per sample, one column per site in ascending position order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HaplotypeMatrix {
    num_samples: usize,
    num_sites: usize,
    haplotypes: Vec<u8>,
}

impl HaplotypeMatrix {
    pub fn num_rows(&self) -> usize {
        self.num_samples
    }

    pub fn num_columns(&self) -> usize {
        self.num_sites
    }

    pub fn row(&self, sample: usize) -> &[u8] {
        &self.haplotypes[sample * self.num_sites..(sample + 1) * self.num_sites]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.num_samples).map(move |i| self.row(i))
    }

    /// Tab-delimited integers, one newline-terminated line per sample,
    /// no header. Zero sites give empty lines.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for row in self.rows() {
            for (site, g) in row.iter().enumerate() {
                if site > 0 {
                    writer.write_all(b"\t")?;
                }
                write!(writer, "{g}")?;
            }
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl From<&TreeSequence> for HaplotypeMatrix {
    fn from(ts: &TreeSequence) -> Self {
        ts.genotype_matrix().transpose()
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_file(haplotypes: &HaplotypeMatrix, path: &Path) -> std::io::Result<()> {
    let partial = partial_path(path);
    let result = fs::File::create(&partial).and_then(|file| {
        let mut writer = BufWriter::new(file);
        haplotypes.write_to(&mut writer)?;
        writer.flush()
    });
    match result.and_then(|_| fs::rename(&partial, path)) {
        Ok(()) => Ok(()),
        Err(e) => {
            match fs::remove_file(&partial) {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => warn!(
                    path = %partial.display(),
                    error = %cleanup,
                    "could not remove partial output"
                ),
                _ => (),
            }
            Err(e)
        }
    }
}

/// Extracts the haplotypes of `ts` and writes them to `path`.
///
/// The file only appears under its final name once it is complete.
/// The parent directory must already exist.
pub fn save_haplotypes(ts: TreeSequence, path: &Path) -> Result<HaplotypeMatrix, WriteError> {
    let haplotypes = HaplotypeMatrix::from(&ts);
    drop(ts);
    write_file(&haplotypes, path).map_err(|source| WriteError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(haplotypes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(h: &HaplotypeMatrix) -> String {
        let mut buffer = vec![];
        h.write_to(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_transpose() {
        // 2 sites x 3 samples
        let g = GenotypeMatrix::new(2, 3, vec![1, 0, 1, 0, 0, 1]).unwrap();
        let h = g.transpose();
        assert_eq!(h.num_rows(), 3);
        assert_eq!(h.num_columns(), 2);
        assert_eq!(h.row(0), &[1, 0]);
        assert_eq!(h.row(1), &[0, 0]);
        assert_eq!(h.row(2), &[1, 1]);
        assert_eq!(render(&h), "1\t0\n0\t0\n1\t1\n");
    }

    #[test]
    fn test_shape_mismatch() {
        assert!(GenotypeMatrix::new(2, 3, vec![0; 5]).is_none());
    }

    #[test]
    fn test_zero_sites_gives_empty_rows() {
        let h = GenotypeMatrix::new(0, 4, vec![]).unwrap().transpose();
        assert_eq!(h.num_rows(), 4);
        assert_eq!(h.num_columns(), 0);
        assert_eq!(render(&h), "\n\n\n\n");
    }

    #[test]
    fn test_write_file_replaces_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haplotypes.txt");
        let h = GenotypeMatrix::new(1, 2, vec![0, 1]).unwrap().transpose();
        write_file(&h, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n1\n");
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("haplotypes.txt");
        let h = GenotypeMatrix::new(1, 2, vec![0, 1]).unwrap().transpose();
        assert!(write_file(&h, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_rename_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haplotypes.txt");
        fs::create_dir(&path).unwrap();
        let h = GenotypeMatrix::new(1, 2, vec![0, 1]).unwrap().transpose();
        assert!(write_file(&h, &path).is_err());
        assert!(path.is_dir());
        assert!(!partial_path(&path).exists());
    }
}
