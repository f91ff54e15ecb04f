//! Host modules scripts can `import`.

use crate::table::Value;

/// Names of the modules the script runtime provides.
pub const HOST_MODULES: &[&str] = &["math", "stats"];

pub fn is_available(module: &str) -> bool {
    HOST_MODULES.contains(&module)
}

pub fn constant(module: &str, name: &str) -> Option<f64> {
    match (module, name) {
        ("math", "pi") => Some(std::f64::consts::PI),
        ("math", "e") => Some(std::f64::consts::E),
        ("math", "tau") => Some(std::f64::consts::TAU),
        _ => None,
    }
}

pub fn call(module: &str, function: &str, args: &[Value]) -> Result<Value, String> {
    match module {
        "math" => call_math(function, args),
        "stats" => call_stats(function, args),
        other => Err(format!("module '{}' is not available", other)),
    }
}

fn call_math(function: &str, args: &[Value]) -> Result<Value, String> {
    let unary: fn(f64) -> f64 = match function {
        "sqrt" => f64::sqrt,
        "abs" => f64::abs,
        "exp" => f64::exp,
        "ln" => f64::ln,
        "log10" => f64::log10,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "floor" => f64::floor,
        "ceil" => f64::ceil,
        "round" => f64::round,
        "pow" => {
            let [base, exponent] = args else {
                return Err(format!("math.pow expects 2 arguments, got {}", args.len()));
            };
            let exponent = exponent
                .as_number()
                .ok_or_else(|| "math.pow exponent must be a number".to_string())?;
            return map_numeric("math.pow", base, |x| x.powf(exponent));
        }
        other => return Err(format!("math has no function '{}'", other)),
    };

    let [arg] = args else {
        return Err(format!(
            "math.{} expects 1 argument, got {}",
            function,
            args.len()
        ));
    };
    map_numeric(&format!("math.{}", function), arg, unary)
}

fn map_numeric(name: &str, value: &Value, f: impl Fn(f64) -> f64) -> Result<Value, String> {
    match value {
        Value::Number(n) => Ok(Value::Number(f(*n))),
        Value::Column(c) => Ok(Value::Column(c.iter().copied().map(f).collect())),
        other => Err(format!(
            "{} expects a number or column, got {}",
            name,
            other.type_name()
        )),
    }
}

fn call_stats(function: &str, args: &[Value]) -> Result<Value, String> {
    let [Value::Column(column)] = args else {
        return Err(format!("stats.{} expects a single column argument", function));
    };
    let result = match function {
        "sum" => column.iter().sum(),
        "count" => column.len() as f64,
        "mean" => {
            if column.is_empty() {
                f64::NAN
            } else {
                column.iter().sum::<f64>() / column.len() as f64
            }
        }
        "min" => column.iter().copied().fold(f64::NAN, f64::min),
        "max" => column.iter().copied().fold(f64::NAN, f64::max),
        other => return Err(format!("stats has no function '{}'", other)),
    };
    Ok(Value::Number(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_maps_over_columns() {
        let out = call("math", "sqrt", &[Value::Column(vec![4.0, 9.0])]).unwrap();
        assert_eq!(out, Value::Column(vec![2.0, 3.0]));
    }

    #[test]
    fn test_math_pow() {
        let out = call("math", "pow", &[Value::Number(2.0), Value::Number(10.0)]).unwrap();
        assert_eq!(out, Value::Number(1024.0));
    }

    #[test]
    fn test_stats_reductions() {
        let col = [Value::Column(vec![1.0, 5.0, 3.0])];
        assert_eq!(call("stats", "sum", &col).unwrap(), Value::Number(9.0));
        assert_eq!(call("stats", "mean", &col).unwrap(), Value::Number(3.0));
        assert_eq!(call("stats", "min", &col).unwrap(), Value::Number(1.0));
        assert_eq!(call("stats", "max", &col).unwrap(), Value::Number(5.0));
        assert_eq!(call("stats", "count", &col).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_unknown_members() {
        assert!(call("math", "gamma", &[Value::Number(1.0)]).is_err());
        assert!(constant("math", "phi").is_none());
        assert!(!is_available("scipy"));
    }
}
