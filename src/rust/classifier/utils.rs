use ndarray::Array1;

/// Numerically stable softmax: the maximum logit is subtracted before
/// exponentiating so large logits cannot overflow.
pub(crate) fn softmax(logits: &[f32]) -> Array1<f64> {
    let logits = Array1::from_iter(logits.iter().map(|&x| f64::from(x)));
    if logits.is_empty() {
        return logits;
    }
    let max = logits.fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
    let exps = logits.mapv(|x| (x - max).exp());
    let sum = exps.sum();
    exps / sum
}

/// Index of the largest value; ties resolve to the lowest index.
pub(crate) fn argmax<T: PartialOrd + Copy>(values: impl IntoIterator<Item = T>) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, value) in values.into_iter().enumerate() {
        let replace = match best {
            None => true,
            Some((_, current)) => value > current,
        };
        if replace {
            best = Some((i, value));
        }
    }
    best.map(|(i, _)| i)
}
