#[cfg(test)]
mod tests {
    extern crate ion_channel_compiler;
    use ndarray::{Array1, Array2, ArrayD, IxDyn};
    use num_complex::Complex64;
    use ion_channel_compiler::{
        channel::{ChannelDefinition, IonChannel, Overrides},
        constants::Ion,
        error::{EvaluationError, IonChannelError},
        registry::builtin_definition,
    };

    fn channel(name: &str) -> Result<IonChannel, IonChannelError> {
        IonChannel::new(&builtin_definition(name)?)
    }

    fn scalar(values: &ArrayD<f64>) -> f64 {
        assert_eq!(values.ndim(), 0);
        *values.iter().next().unwrap()
    }

    fn close(a: f64, b: f64, relative: f64) -> bool {
        (a - b).abs() <= relative * a.abs().max(b.abs()) + 1e-9
    }

    fn voltages() -> Vec<f64> {
        (0..31).map(|n| -100. + 5. * n as f64).collect()
    }

    #[test]
    pub fn test_open_probability_at_rest() -> Result<(), IonChannelError> {
        let nata = channel("NaTa")?;
        let p_open = scalar(&nata.compute_open_probability(-65., &Overrides::new())?);

        assert!((0. ..=1.).contains(&p_open));

        Ok(())
    }

    #[test]
    pub fn test_open_probability_matches_asymptotic_values() -> Result<(), IonChannelError> {
        let nata = channel("NaTa")?;
        let voltages = voltages();

        let p_open = nata.compute_open_probability(voltages.clone(), &Overrides::new())?;
        let asymptotic = nata.compute_asymptotic_value(voltages.clone())?;

        assert_eq!(p_open.shape(), &[voltages.len()]);
        for n in 0..voltages.len() {
            let m = asymptotic["m"].as_slice().unwrap()[n];
            let h = asymptotic["h"].as_slice().unwrap()[n];
            let expected = h * m.powi(3);

            assert!((p_open.as_slice().unwrap()[n] - expected).abs() < 1e-9);
        }

        Ok(())
    }

    #[test]
    pub fn test_overrides_broadcast() -> Result<(), IonChannelError> {
        let nata = channel("NaTa")?;
        let voltage = Array1::from(vec![-70., -50., -30.]);
        let m = Array2::from_shape_vec((2, 1), vec![0.2, 0.4]).unwrap();

        let overrides = Overrides::new().with("m", m).with("h", 0.5);
        let p_open = nata.compute_open_probability(&voltage, &overrides)?;

        assert_eq!(p_open.shape(), &[2, 3]);
        assert!(close(p_open[IxDyn(&[1, 2])], 0.5 * 0.4_f64.powi(3), 1e-12));

        let result = nata.compute_open_probability(&voltage, &Overrides::new().with("n", 0.1));
        assert!(matches!(result, Err(IonChannelError::EvaluationRelatedError(EvaluationError::UnknownOverride(name))) if name == "n"));

        let mismatched = Overrides::new().with("m", vec![0.1, 0.2]);
        let result = nata.compute_open_probability(&voltage, &mismatched);
        assert!(matches!(result, Err(IonChannelError::EvaluationRelatedError(EvaluationError::IncompatibleShapes(_, _)))));

        Ok(())
    }

    #[test]
    pub fn test_derivatives_match_finite_differences() -> Result<(), IonChannelError> {
        let h = 1e-3;

        for name in ["NaTa", "Km", "Kv3_1", "h"] {
            let channel = channel(name)?;
            let states = channel.model().state_variables().to_vec();

            let mut overrides = Overrides::new();
            for (n, state) in states.iter().enumerate() {
                overrides = overrides.with(state, 0.3 + 0.2 * n as f64);
            }

            for v in voltages() {
                let derivatives = channel.compute_derivatives(v, &overrides)?;
                let above = channel.compute_rate_of_change(v + h, &overrides)?;
                let below = channel.compute_rate_of_change(v - h, &overrides)?;

                for (n, state) in states.iter().enumerate() {
                    let approximation = (scalar(&above[state]) - scalar(&below[state])) / (2. * h);
                    let exact = scalar(&derivatives.df_dv[state]);
                    assert!(close(approximation, exact, 1e-4), "{} {} at {}: {} vs {}", name, state, v, approximation, exact);

                    let value = 0.3 + 0.2 * n as f64;
                    let raised = overrides.clone().with(state, value + h);
                    let lowered = overrides.clone().with(state, value - h);

                    let p_above = scalar(&channel.compute_open_probability(v, &raised)?);
                    let p_below = scalar(&channel.compute_open_probability(v, &lowered)?);
                    let approximation = (p_above - p_below) / (2. * h);
                    let exact = scalar(&derivatives.dp_dx[state]);
                    assert!(close(approximation, exact, 1e-4), "dp/d{} of {} at {}: {} vs {}", state, name, v, approximation, exact);

                    let f_above = scalar(&channel.compute_rate_of_change(v, &raised)?[state]);
                    let f_below = scalar(&channel.compute_rate_of_change(v, &lowered)?[state]);
                    let approximation = (f_above - f_below) / (2. * h);
                    let exact = scalar(&derivatives.df_dx[state]);
                    assert!(close(approximation, exact, 1e-4), "df/d{} of {} at {}: {} vs {}", state, name, v, approximation, exact);
                }
            }
        }

        Ok(())
    }

    #[test]
    pub fn test_state_derivatives() -> Result<(), IonChannelError> {
        let nata = channel("NaTa")?;
        let overrides = Overrides::new().with("m", 0.3).with("h", 0.6);

        for v in voltages() {
            let derivatives = nata.compute_derivatives(v, &overrides)?;
            let time_constants = nata.compute_time_constant(v)?;

            assert!(close(scalar(&derivatives.dp_dx["m"]), 3. * 0.6 * 0.3_f64.powi(2), 1e-12));
            assert!(close(scalar(&derivatives.dp_dx["h"]), 0.3_f64.powi(3), 1e-12));

            for state in ["h", "m"] {
                let expected = -1. / scalar(&time_constants[state]);
                assert!(close(scalar(&derivatives.df_dx[state]), expected, 1e-9), "{} at {}", state, v);
            }
        }

        Ok(())
    }

    #[test]
    pub fn test_concentration_derivatives() -> Result<(), IonChannelError> {
        let sk = channel("SK")?;
        let h = 1e-9;
        let base = 2e-4;

        for v in [-80., -40., 0.] {
            let overrides = Overrides::new().with("z", 0.4);
            let derivatives = sk.compute_derivatives_concentration(v, &overrides.clone().with("ca", base))?;
            let above = sk.compute_rate_of_change(v, &overrides.clone().with("ca", base + h))?;
            let below = sk.compute_rate_of_change(v, &overrides.with("ca", base - h))?;

            let approximation = (scalar(&above["z"]) - scalar(&below["z"])) / (2. * h);
            assert!(close(approximation, scalar(&derivatives["z"]["ca"]), 1e-4));
        }

        Ok(())
    }

    #[test]
    pub fn test_linear_admittance() -> Result<(), IonChannelError> {
        let kv = channel("Kv3_1")?;
        let voltage = vec![-60., -20., 20.];
        let frequencies = vec![
            Complex64::new(0., 0.),
            Complex64::new(0., 10.),
            Complex64::new(0., 100.),
            Complex64::new(0., 1000.),
        ];

        let admittance = kv.compute_linear_admittance(voltage.clone(), frequencies, &Overrides::new())?;
        assert_eq!(admittance.shape(), &[4, 3]);

        // at zero frequency a single state channel responds with d(p_inf)/dv
        let h = 1e-4;
        let above = kv.compute_asymptotic_value(voltage.iter().map(|v| v + h).collect::<Vec<f64>>())?;
        let below = kv.compute_asymptotic_value(voltage.iter().map(|v| v - h).collect::<Vec<f64>>())?;
        for n in 0..voltage.len() {
            let slope = (above["m"].as_slice().unwrap()[n] - below["m"].as_slice().unwrap()[n]) / (2. * h);
            let value = admittance[IxDyn(&[0, n])];

            assert!(close(value.re, slope, 1e-5));
            assert!(value.im.abs() < 1e-12);
            assert!(admittance[IxDyn(&[3, n])].norm() < value.norm());
        }

        let scalar_frequency = kv.compute_linear_admittance(-20., 0., &Overrides::new())?;
        assert_eq!(scalar_frequency.ndim(), 0);
        assert!(close(scalar_frequency.iter().next().unwrap().re, admittance[IxDyn(&[0, 1])].re, 1e-12));

        Ok(())
    }

    #[test]
    pub fn test_linear_current_sum() -> Result<(), IonChannelError> {
        let h = channel("h")?;
        let overrides = Overrides::new();

        let admittance = h.compute_linear_admittance(-70., 5., &overrides)?;
        let p_open = scalar(&h.compute_open_probability(-70., &overrides)?);
        let current = h.compute_linear_current_sum(-70., 5., None, &overrides)?;

        let expected = *admittance.iter().next().unwrap() * (-43. + 70.) - p_open;
        let value = *current.iter().next().unwrap();
        assert!((value - expected).norm() < 1e-12);

        let shifted = h.compute_linear_current_sum(-70., 5., Some(0.), &overrides)?;
        let expected = *admittance.iter().next().unwrap() * 70. - p_open;
        assert!((*shifted.iter().next().unwrap() - expected).norm() < 1e-12);

        Ok(())
    }

    #[test]
    pub fn test_missing_reversal() -> Result<(), IonChannelError> {
        let leak = IonChannel::new(
            &ChannelDefinition::new("NoReversal", "q").with_asymptotic("q", "1. / (1. + exp(-v / 5.))", "3.")
        )?;

        let result = leak.compute_linear_current_sum(-60., 1., None, &Overrides::new());
        assert!(matches!(
            result,
            Err(IonChannelError::EvaluationRelatedError(EvaluationError::MissingReversal(name))) if name == "NoReversal"
        ));

        let current = leak.compute_linear_current_sum(-60., 1., Some(-80.), &Overrides::new())?;
        assert!(current.iter().all(|c| c.re.is_finite() && c.im.is_finite()));

        Ok(())
    }

    #[test]
    pub fn test_concentration_current() -> Result<(), IonChannelError> {
        let sk = channel("SK")?;
        let voltage = vec![-80., -60.];
        let frequencies: Vec<f64> = vec![1., 10., 100.];

        let current = sk.compute_linear_current_concentration(
            voltage.clone(), frequencies.clone(), "ca", None, &Overrides::new(),
        )?;
        assert_eq!(current.shape(), &[3, 2]);

        let admittance = sk.compute_linear_admittance_concentration(
            voltage, frequencies.clone(), "ca", &Overrides::new(),
        )?;
        let reversal = Ion::K.default_reversal();
        assert!((current[IxDyn(&[1, 0])] - admittance[IxDyn(&[1, 0])] * (reversal + 80.)).norm() < 1e-9);

        let result = sk.compute_linear_admittance_concentration(-60., frequencies, "na", &Overrides::new());
        assert!(matches!(
            result,
            Err(IonChannelError::EvaluationRelatedError(EvaluationError::UnknownConcentration(name))) if name == "na"
        ));

        Ok(())
    }

    #[test]
    pub fn test_default_parameters_invalidate_cache() -> Result<(), IonChannelError> {
        let mut km = channel("Km")?;
        assert!(!km.is_specialized());

        let warm = scalar(&km.compute_time_constant(-40.)?["m"]);
        assert!(km.is_specialized());

        km.set_default_parameters(Some(21.), None);
        assert!(!km.is_specialized());

        let cold = scalar(&km.compute_time_constant(-40.)?["m"]);
        assert!(close(cold / warm, 2.3_f64.powf(1.5), 1e-9));
        assert_eq!(km.model().reversal(), Some(Ion::K.default_reversal()));

        Ok(())
    }
}
