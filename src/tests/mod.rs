
#[cfg(test)]
mod arsc_cases;
