use std::fs;

use im_sweep::*;

fn params() -> ModelParameters {
    ModelParameters {
        n1: 2000.0,
        n2: 1000.0,
        t_split: 500.0,
        n_anc: 4000.0,
        mutation_rate: 5e-7,
        length: 2e4,
        mig: 0.35,
    }
}

#[test]
fn test_written_matrix_matches_the_simulation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replicate.txt");
    let model = isolation_with_migration(&params(), SampleSizes::new(6, 4)).unwrap();
    let ts = run_simulation(&HudsonEngine, &model, &params(), 1e-8, Some(77)).unwrap();
    let genotypes = ts.genotype_matrix();
    let num_sites = ts.num_sites();
    assert!(num_sites > 0);

    let haplotypes = save_haplotypes(ts, &path).unwrap();
    assert_eq!(haplotypes, genotypes.transpose());

    let text = fs::read_to_string(&path).unwrap();
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 10);
    for (sample, line) in lines.iter().enumerate() {
        let row = line
            .split('\t')
            .map(|t| t.parse::<u8>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(row.len(), num_sites);
        assert!(row.iter().all(|g| *g <= 1));
        for (site, g) in row.iter().enumerate() {
            assert_eq!(*g, genotypes.site(site)[sample]);
        }
    }
}

#[test]
fn test_same_seed_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let model = isolation_with_migration(&params(), SampleSizes::new(5, 5)).unwrap();
    for name in ["a.txt", "b.txt"] {
        let ts = run_simulation(&HudsonEngine, &model, &params(), 1e-8, Some(31337)).unwrap();
        save_haplotypes(ts, &dir.path().join(name)).unwrap();
    }
    assert_eq!(
        fs::read(dir.path().join("a.txt")).unwrap(),
        fs::read(dir.path().join("b.txt")).unwrap()
    );
}

#[test]
fn test_every_column_is_a_variant_site_under_reference_parameters() {
    let params = ModelParameters::default().with_migration(0.1);
    let model = isolation_with_migration(&params, SampleSizes::default()).unwrap();
    for seed in 1..=3 {
        let ts = run_simulation(&HudsonEngine, &model, &params, 8.4e-9, Some(seed)).unwrap();
        assert!(ts.num_sites() > 0);
        assert_eq!(ts.num_sites(), ts.num_mutations());
        let genotypes = ts.genotype_matrix();
        for s in 0..genotypes.num_sites() {
            let site = genotypes.site(s);
            assert!(site.contains(&0), "seed {seed}, site {s} is fixed for 1");
            assert!(site.contains(&1), "seed {seed}, site {s} is fixed for 0");
        }
    }
}
