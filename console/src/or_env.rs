//! Fill CLI options from fallback env vars, e.g.
//! `args.hub_url.or_env_mut("HUB_URL")?`.
//!
//! Works with any `FromStr` type; a value that fails to parse is an error
//! naming the env var.

use std::{env, str::FromStr};

use anyhow::Context;

pub trait OrEnvExt: Sized {
    /// Takes ownership of the arg if set, otherwise initializes it from env.
    fn or_env(mut self, env_var: &'static str) -> anyhow::Result<Self> {
        self.or_env_mut(env_var)?;
        Ok(self)
    }

    /// If the arg is not set, initialize it from env in place.
    fn or_env_mut(
        &mut self,
        env_var: &'static str,
    ) -> anyhow::Result<&mut Self>;
}

fn env_var_opt(env_var: &'static str) -> anyhow::Result<Option<String>> {
    match env::var(env_var) {
        Ok(val_str) => Ok(Some(val_str)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(s)) =>
            Err(anyhow::format_err!("invalid unicode: '{s:?}'")),
    }
}

impl<T> OrEnvExt for Option<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    fn or_env_mut(
        &mut self,
        env_var: &'static str,
    ) -> anyhow::Result<&mut Option<T>> {
        if self.is_some() {
            return Ok(self);
        }

        let Some(val_str) = env_var_opt(env_var).context(env_var)? else {
            return Ok(self);
        };
        let val = T::from_str(val_str.trim())
            .map_err(Into::into)
            .with_context(|| format!("Invalid env value `${env_var}`"))?;
        *self = Some(val);
        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_arg_wins() {
        let arg = Some(5_u64).or_env("HUB_CONSOLE_TEST_NEVER_SET").unwrap();
        assert_eq!(arg, Some(5));
    }

    #[test]
    fn missing_env_leaves_none() {
        let arg = None::<u64>.or_env("HUB_CONSOLE_TEST_NEVER_SET").unwrap();
        assert_eq!(arg, None);
    }

    #[test]
    fn parses_env() {
        // SAFETY: no other test reads or writes this var.
        unsafe { env::set_var("HUB_CONSOLE_TEST_TIMEOUT", " 12 ") };
        let arg = None::<u64>.or_env("HUB_CONSOLE_TEST_TIMEOUT").unwrap();
        assert_eq!(arg, Some(12));

        // SAFETY: as above.
        unsafe { env::set_var("HUB_CONSOLE_TEST_BAD", "twelve") };
        let err = None::<u64>.or_env("HUB_CONSOLE_TEST_BAD").unwrap_err();
        assert!(format!("{err:#}").contains("HUB_CONSOLE_TEST_BAD"));
    }
}
