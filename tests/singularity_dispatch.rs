#[cfg(test)]
mod tests {
    extern crate ion_channel_compiler;
    use rand::Rng;
    use ion_channel_compiler::{
        channel::{ChannelDefinition, ChannelFunctions, IonChannel, Overrides},
        constants::TRAP_TOLERANCE,
        error::IonChannelError,
        registry::builtin_definition,
    };

    const SINGULAR_VOLTAGES: [f64; 2] = [-66., -38.];

    fn sample_voltages() -> Vec<f64> {
        let mut rng = rand::thread_rng();
        let mut voltages = vec![];

        for point in SINGULAR_VOLTAGES {
            voltages.push(point);
            voltages.push(point + TRAP_TOLERANCE);
            voltages.push(point - TRAP_TOLERANCE);
            for _ in 0..20 {
                voltages.push(point + rng.gen_range(-2. * TRAP_TOLERANCE..2. * TRAP_TOLERANCE));
            }
        }
        for _ in 0..20 {
            voltages.push(rng.gen_range(-100.0..50.0));
        }

        voltages
    }

    #[test]
    pub fn test_singular_points_are_found() -> Result<(), IonChannelError> {
        let model = builtin_definition("NaTa")?.build()?;
        let functions = ChannelFunctions::specialize(&model)?;

        for state in ["h", "m"] {
            let points = functions.asymptotic_value[state].singular_points();
            assert!(!points.is_empty(), "{}", state);
            for point in points {
                assert!(SINGULAR_VOLTAGES.iter().any(|p| (p - point).abs() < 1e-9), "{}: {}", state, point);
            }
        }

        let model = builtin_definition("Kv3_1")?.build()?;
        let functions = ChannelFunctions::specialize(&model)?;
        assert!(functions.asymptotic_value["m"].singular_points().is_empty());

        Ok(())
    }

    #[test]
    pub fn test_values_are_finite_near_singular_points() -> Result<(), IonChannelError> {
        let nata = IonChannel::new(&builtin_definition("NaTa")?)?;
        let voltages = sample_voltages();
        let overrides = Overrides::new().with("m", 0.4).with("h", 0.7);

        let asymptotic = nata.compute_asymptotic_value(voltages.clone())?;
        let time_constant = nata.compute_time_constant(voltages.clone())?;
        let derivatives = nata.compute_derivatives(voltages.clone(), &overrides)?;

        for values in asymptotic.values()
            .chain(time_constant.values())
            .chain(derivatives.df_dv.values())
            .chain(derivatives.df_dx.values())
        {
            assert!(values.iter().all(|x| x.is_finite()));
        }

        // limit at -38 mV equals the value approached from either side
        let at_point = nata.compute_asymptotic_value(-38.)?;
        let beside = nata.compute_asymptotic_value(vec![-38.01, -37.99])?;
        let limit = *at_point["m"].iter().next().unwrap();
        let sides = beside["m"].as_slice().unwrap();
        assert!((limit - (sides[0] + sides[1]) / 2.).abs() < 1e-4);

        Ok(())
    }

    #[test]
    pub fn test_array_and_scalar_paths_agree() -> Result<(), IonChannelError> {
        let nata = IonChannel::new(&builtin_definition("NaTa")?)?;
        let voltages = sample_voltages();
        let overrides = Overrides::new();

        let array = nata.compute_derivatives(voltages.clone(), &overrides)?;
        for (n, v) in voltages.iter().enumerate() {
            let single = nata.compute_derivatives(*v, &overrides)?;

            for state in ["h", "m"] {
                let from_array = array.df_dv[state].as_slice().unwrap()[n];
                let from_scalar = *single.df_dv[state].iter().next().unwrap();
                assert_eq!(from_array.to_bits(), from_scalar.to_bits(), "{} at {}", state, v);
            }
        }

        Ok(())
    }

    #[test]
    pub fn test_declared_singular_voltage() -> Result<(), IonChannelError> {
        // exp(v) - 1 has a root the scan finds, the declared -10 is added on top
        let definition = ChannelDefinition::new("Declared", "q")
            .with_rates("q", "v / (exp(v / 4.) - 1.)", "0.5")
            .with_singular_voltages(&[-10.]);
        let model = definition.build()?;
        let functions = ChannelFunctions::specialize(&model)?;

        let points = functions.time_constant["q"].singular_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], -10.);
        assert!(points[1].abs() < 1e-12);

        let channel = IonChannel::from_model(model);
        let tau = channel.compute_time_constant(vec![0., 1e-5, -1e-5])?;
        let values = tau["q"].as_slice().unwrap();
        assert!(values.iter().all(|x| x.is_finite()));
        assert!((values[0] - 1. / (4. + 0.5)).abs() < 1e-9);

        Ok(())
    }
}
