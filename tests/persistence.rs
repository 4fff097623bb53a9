#[cfg(test)]
mod tests {
    extern crate ion_channel_compiler;
    use ion_channel_compiler::{
        channel::{ChannelDefinition, IonChannel, Overrides},
        error::{ConfigError, IonChannelError},
        registry::builtin_definition,
    };

    #[test]
    pub fn test_model_round_trip() -> Result<(), IonChannelError> {
        let voltages = vec![-90., -65., -38., -20., 15.];

        for name in ["NaTa", "Km", "SK", "h"] {
            let channel = IonChannel::new(&builtin_definition(name)?)?;
            let before = channel.compute_open_probability(voltages.clone(), &Overrides::new())?;
            assert!(channel.is_specialized());

            let restored = IonChannel::from_json(&channel.to_json()?)?;
            assert!(!restored.is_specialized());
            assert_eq!(restored.model(), channel.model());

            let after = restored.compute_open_probability(voltages.clone(), &Overrides::new())?;
            for (a, b) in before.iter().zip(after.iter()) {
                assert!((a - b).abs() < 1e-12, "{}: {} vs {}", name, a, b);
            }
        }

        Ok(())
    }

    #[test]
    pub fn test_parameters_survive_round_trip() -> Result<(), IonChannelError> {
        let mut channel = IonChannel::new(&builtin_definition("Km")?)?;
        channel.set_default_parameters(Some(24.), Some(-90.));

        let restored = IonChannel::from_json(&channel.to_json()?)?;
        assert_eq!(restored.model().default_parameters().temperature, 24.);
        assert_eq!(restored.model().reversal(), Some(-90.));

        let a = channel.compute_time_constant(-30.)?;
        let b = restored.compute_time_constant(-30.)?;
        assert_eq!(a["m"], b["m"]);

        Ok(())
    }

    #[test]
    pub fn test_definition_json() -> Result<(), IonChannelError> {
        let definition = builtin_definition("SK")?;
        let text = serde_json::to_string(&definition).unwrap();
        let restored: ChannelDefinition = serde_json::from_str(&text).unwrap();

        assert_eq!(restored, definition);
        assert_eq!(restored.build()?, definition.build()?);

        Ok(())
    }

    #[test]
    pub fn test_invalid_json() {
        let result = IonChannel::from_json("{\"model\": 3}");
        assert!(matches!(result, Err(IonChannelError::ConfigRelatedError(ConfigError::JsonDecode(_)))));
    }
}
