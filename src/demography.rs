//! Demographic models: population definitions plus a time-ordered
//! schedule of events, with time running backwards from the present.

use crate::error::{ModelError, ParameterError};
use crate::parameters::{ModelParameters, SampleSizes};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PopulationConfiguration {
    pub sample_size: u32,
    /// Present-day diploid effective size.
    pub initial_size: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DemographicEvent {
    /// Moves each lineage in `source` into `destination`
    /// with probability `proportion`.
    MassMigration {
        time: f64,
        source: usize,
        destination: usize,
        proportion: f64,
    },
    /// Resets the size of `population` from `time` onwards (into the past).
    SizeChange {
        time: f64,
        population: usize,
        new_size: f64,
    },
}

impl DemographicEvent {
    pub fn time(&self) -> f64 {
        match self {
            Self::MassMigration { time, .. } => *time,
            Self::SizeChange { time, .. } => *time,
        }
    }

    fn check(&self, index: usize, num_populations: usize) -> Result<(), ModelError> {
        let time = self.time();
        if !time.is_finite() || time < 0.0 {
            return Err(ModelError::InvalidEventTime { index, time });
        }
        let known = |population: usize| {
            if population < num_populations {
                Ok(())
            } else {
                Err(ModelError::UnknownPopulation { index, population })
            }
        };
        match *self {
            Self::MassMigration {
                source,
                destination,
                proportion,
                ..
            } => {
                known(source)?;
                known(destination)?;
                if source == destination {
                    return Err(ModelError::SelfMigration {
                        index,
                        population: source,
                    });
                }
                if !(0.0..=1.0).contains(&proportion) {
                    return Err(ModelError::InvalidProportion { index, proportion });
                }
            }
            Self::SizeChange {
                population,
                new_size,
                ..
            } => {
                known(population)?;
                if !new_size.is_finite() || new_size <= 0.0 {
                    return Err(ModelError::InvalidPopulationSize {
                        population,
                        size: new_size,
                    });
                }
            }
        }
        Ok(())
    }
}

/// A validated demographic model.
///
/// Events are kept in the order given, which must be
/// non-decreasing in time.
#[derive(Clone, Debug, PartialEq)]
pub struct DemographicModel {
    populations: Vec<PopulationConfiguration>,
    events: Vec<DemographicEvent>,
}

impl DemographicModel {
    pub fn new(
        populations: Vec<PopulationConfiguration>,
        events: Vec<DemographicEvent>,
    ) -> Result<Self, ModelError> {
        let model = Self {
            populations,
            events,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.populations.is_empty() {
            return Err(ModelError::NoPopulations);
        }
        for (population, config) in self.populations.iter().enumerate() {
            if !config.initial_size.is_finite() || config.initial_size <= 0.0 {
                return Err(ModelError::InvalidPopulationSize {
                    population,
                    size: config.initial_size,
                });
            }
        }
        let mut previous = 0.0;
        for (index, event) in self.events.iter().enumerate() {
            event.check(index, self.populations.len())?;
            if event.time() < previous {
                return Err(ModelError::EventsOutOfOrder {
                    index,
                    time: event.time(),
                    previous,
                });
            }
            previous = event.time();
        }
        Ok(())
    }

    pub fn populations(&self) -> &[PopulationConfiguration] {
        &self.populations
    }

    pub fn events(&self) -> &[DemographicEvent] {
        &self.events
    }

    pub fn num_samples(&self) -> usize {
        self.populations
            .iter()
            .map(|p| p.sample_size as usize)
            .sum()
    }
}

/// Two populations that split from an ancestral one at `T_split`,
/// with a single admixture pulse at `T_split / 2`.
///
/// For `mig >= 0` the pulse moves lineages from population 1 into
/// population 0 (backwards in time), otherwise from 0 into 1. A
/// `mig` of zero still yields a pulse, with proportion zero.
pub fn isolation_with_migration(
    params: &ModelParameters,
    samples: SampleSizes,
) -> Result<DemographicModel, ParameterError> {
    let params = params.validate()?;
    let [sample0, sample1] = samples.as_array();

    let populations = vec![
        PopulationConfiguration {
            sample_size: sample0,
            initial_size: params.n1,
        },
        PopulationConfiguration {
            sample_size: sample1,
            initial_size: params.n2,
        },
    ];

    let (source, destination) = if params.mig >= 0.0 { (1, 0) } else { (0, 1) };
    let events = vec![
        DemographicEvent::MassMigration {
            time: params.t_split / 2.0,
            source,
            destination,
            proportion: params.mig.abs(),
        },
        DemographicEvent::MassMigration {
            time: params.t_split,
            source: 1,
            destination: 0,
            proportion: 1.0,
        },
        DemographicEvent::SizeChange {
            time: params.t_split,
            population: 0,
            new_size: params.n_anc,
        },
    ];

    Ok(DemographicModel::new(populations, events)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pulse(model: &DemographicModel) -> (f64, usize, usize, f64) {
        match model.events()[0] {
            DemographicEvent::MassMigration {
                time,
                source,
                destination,
                proportion,
            } => (time, source, destination, proportion),
            e => panic!("expected a pulse, got {e:?}"),
        }
    }

    #[test]
    fn test_reference_schedule() {
        let params = ModelParameters::default().with_migration(0.1);
        let model = isolation_with_migration(&params, SampleSizes::new(50, 50)).unwrap();
        assert_eq!(
            model.populations(),
            &[
                PopulationConfiguration {
                    sample_size: 50,
                    initial_size: 158_124_480.0
                },
                PopulationConfiguration {
                    sample_size: 50,
                    initial_size: 54_259_530.0
                }
            ]
        );
        assert_eq!(
            model.events(),
            &[
                DemographicEvent::MassMigration {
                    time: 509.0,
                    source: 1,
                    destination: 0,
                    proportion: 0.1
                },
                DemographicEvent::MassMigration {
                    time: 1018.0,
                    source: 1,
                    destination: 0,
                    proportion: 1.0
                },
                DemographicEvent::SizeChange {
                    time: 1018.0,
                    population: 0,
                    new_size: 7_148_911.0
                },
            ]
        );
        assert_eq!(model.num_samples(), 100);
    }

    #[test]
    fn test_pulse_direction_follows_sign() {
        let base = ModelParameters::default();
        let samples = SampleSizes::default();

        let model = isolation_with_migration(&base.with_migration(0.35), samples).unwrap();
        let (_, source, destination, proportion) = pulse(&model);
        assert_eq!((source, destination, proportion), (1, 0, 0.35));

        let model = isolation_with_migration(&base.with_migration(-0.7), samples).unwrap();
        let (_, source, destination, proportion) = pulse(&model);
        assert_eq!((source, destination, proportion), (0, 1, 0.7));
    }

    #[test]
    fn test_zero_migration_keeps_the_pulse() {
        let params = ModelParameters::default().with_migration(0.0);
        let model = isolation_with_migration(&params, SampleSizes::default()).unwrap();
        assert_eq!(model.events().len(), 3);
        let (time, source, destination, proportion) = pulse(&model);
        assert_eq!(time, 509.0);
        assert_eq!((source, destination), (1, 0));
        assert_eq!(proportion, 0.0);
    }

    #[test]
    fn test_builder_is_deterministic() {
        let params = ModelParameters::default().with_migration(-0.2);
        let a = isolation_with_migration(&params, SampleSizes::new(3, 7)).unwrap();
        let b = isolation_with_migration(&params, SampleSizes::new(3, 7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_builder_rejects_bad_parameters() {
        let params = ModelParameters {
            n2: -5.0,
            ..ModelParameters::default()
        };
        assert!(matches!(
            isolation_with_migration(&params, SampleSizes::default()),
            Err(ParameterError::NotPositive { field: "N2", .. })
        ));
    }

    #[test]
    fn test_model_rejects_out_of_order_events() {
        let populations = vec![PopulationConfiguration {
            sample_size: 2,
            initial_size: 100.0,
        }];
        let events = vec![
            DemographicEvent::SizeChange {
                time: 10.0,
                population: 0,
                new_size: 50.0,
            },
            DemographicEvent::SizeChange {
                time: 5.0,
                population: 0,
                new_size: 20.0,
            },
        ];
        assert_eq!(
            DemographicModel::new(populations, events),
            Err(ModelError::EventsOutOfOrder {
                index: 1,
                time: 5.0,
                previous: 10.0
            })
        );
    }

    #[test]
    fn test_model_rejects_bad_events() {
        let populations = vec![
            PopulationConfiguration {
                sample_size: 2,
                initial_size: 100.0,
            },
            PopulationConfiguration {
                sample_size: 2,
                initial_size: 100.0,
            },
        ];
        let check = |event: DemographicEvent| {
            DemographicModel::new(populations.clone(), vec![event]).unwrap_err()
        };
        assert!(matches!(
            check(DemographicEvent::MassMigration {
                time: -1.0,
                source: 0,
                destination: 1,
                proportion: 0.5
            }),
            ModelError::InvalidEventTime { index: 0, .. }
        ));
        assert!(matches!(
            check(DemographicEvent::MassMigration {
                time: 1.0,
                source: 0,
                destination: 2,
                proportion: 0.5
            }),
            ModelError::UnknownPopulation { population: 2, .. }
        ));
        assert!(matches!(
            check(DemographicEvent::MassMigration {
                time: 1.0,
                source: 1,
                destination: 1,
                proportion: 0.5
            }),
            ModelError::SelfMigration { population: 1, .. }
        ));
        assert!(matches!(
            check(DemographicEvent::MassMigration {
                time: 1.0,
                source: 0,
                destination: 1,
                proportion: 1.5
            }),
            ModelError::InvalidProportion { .. }
        ));
        assert!(matches!(
            check(DemographicEvent::SizeChange {
                time: 1.0,
                population: 0,
                new_size: 0.0
            }),
            ModelError::InvalidPopulationSize { population: 0, .. }
        ));
    }

    proptest! {
        #[test]
        fn test_three_events_in_time_order(n1 in 1.0..1e9_f64,
                                           n2 in 1.0..1e9_f64,
                                           n_anc in 1.0..1e9_f64,
                                           t_split in 1e-3..1e6_f64,
                                           mig in -1.0..=1.0_f64,
                                           sample0 in 0..200_u32,
                                           sample1 in 0..200_u32)
        {
            let params = ModelParameters {
                n1,
                n2,
                t_split,
                n_anc,
                mig,
                ..ModelParameters::default()
            };
            let model = isolation_with_migration(&params, SampleSizes::new(sample0, sample1)).unwrap();
            prop_assert_eq!(model.events().len(), 3);
            prop_assert!(model.events().windows(2).all(|w| w[0].time() <= w[1].time()));
            prop_assert_eq!(model.events()[1].time(), t_split);
            prop_assert_eq!(model.events()[2].time(), t_split);
            let (_, source, destination, proportion) = pulse(&model);
            prop_assert_eq!(proportion, mig.abs());
            if mig >= 0.0 {
                prop_assert_eq!((source, destination), (1, 0));
            } else {
                prop_assert_eq!((source, destination), (0, 1));
            }
        }
    }
}
