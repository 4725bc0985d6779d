//! Display formatting for amounts.

/// Round to whole units and group thousands with commas: -1234567.4 -> "-1,234,567".
pub fn grouped(val: f64) -> String {
    let rounded = val.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut with_commas = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-{}", with_commas)
    } else {
        with_commas
    }
}
