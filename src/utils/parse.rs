use crate::utils::error::ModbusError;

/// Parses `0x`-prefixed hexadecimal or plain decimal integers.
pub fn parse_int(input: &str) -> Result<i64, ModbusError> {
    let text = input.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|e| ModbusError::ConfigError(format!("invalid number '{}': {}", input, e)))?;

    Ok(if negative { -value } else { value })
}

/// Parses an integer and checks that it fits in `T`.
pub fn parse_bounded<T>(input: &str, what: &str) -> Result<T, ModbusError>
where
    T: TryFrom<i64>,
{
    let value = parse_int(input)?;
    T::try_from(value)
        .map_err(|_| ModbusError::ConfigError(format!("{} out of range: {}", what, input)))
}
