use ndarray::{concatenate, prelude::*};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Instant;
use tracing::{debug, info};
use crate::config::TrainParams;
use crate::cooccurrence::Cooccurrences;
use crate::embedding::WordVectors;
use crate::error::{Error, Result};

/// GloVe weights with their AdaGrad accumulators.
pub struct Glove {
    w_tokens: Array2<f32>,
    w_context: Array2<f32>,
    b_tokens: Array1<f32>,
    b_context: Array1<f32>,
    ag_w_tok: Array2<f32>,
    ag_w_context: Array2<f32>,
    ag_b_tok: Array1<f32>,
    ag_b_context: Array1<f32>,
}

/// Mean batch loss of every epoch, in order.
#[derive(Clone, Debug, Default)]
pub struct TrainReport {
    pub epoch_losses: Vec<f32>,
}

impl Glove {

    fn new(vocab_size: usize, embedding_dim: usize, rng: &mut StdRng) -> Glove {

        let dist = Uniform::new(-0.5f32, 0.5f32);
        let scale = embedding_dim as f32;
        Self {
            w_tokens: Array::random_using((vocab_size, embedding_dim), dist, rng) / scale,
            w_context: Array::random_using((vocab_size, embedding_dim), dist, rng) / scale,
            b_tokens: Array::random_using(vocab_size, dist, rng) / scale,
            b_context: Array::random_using(vocab_size, dist, rng) / scale,
            // starting at 1.0 makes the first step size equal to the learning rate
            ag_w_tok: Array2::ones((vocab_size, embedding_dim)),
            ag_w_context: Array2::ones((vocab_size, embedding_dim)),
            ag_b_tok: Array1::ones(vocab_size),
            ag_b_context: Array1::ones(vocab_size),
        }
    }

    fn weighting(x: f32, x_max: f32, alpha: f32) -> f32 {
        if x < x_max {
            (x / x_max).powf(alpha)
        } else {
            1.0
        }
    }

    /// Adds the mirrored `[j, i, x]` rows to a one-sided slice.
    pub fn symmetric(slice: &Array2<f32>) -> Result<Array2<f32>> {
        let mirrored = slice.select(Axis(1), &[1, 0, 2]);
        Ok(concatenate(Axis(0), &[slice.view(), mirrored.view()])?)
    }

    // returns the summed batch losses and the number of batches
    fn train_slice(&mut self, slice: &Array2<f32>, params: &TrainParams, rng: &mut StdRng) -> (f32, usize) {

        let lr = params.learning_rate;
        let mut order: Vec<usize> = (0..slice.dim().0).collect();
        order.shuffle(rng);

        let mut loss_sum = 0.0;
        let mut n_batches = 0;
        for chunk in order.chunks(params.batch_size) {

            let is: Vec<usize> = chunk.iter().map(|&r| slice[[r, 0]] as usize).collect();
            let js: Vec<usize> = chunk.iter().map(|&r| slice[[r, 1]] as usize).collect();
            let xs: Array1<f32> = chunk.iter().map(|&r| slice[[r, 2]]).collect();

            // (batch, embedding_dim) for vectors, (batch,) for biases
            let v_tok = self.w_tokens.select(Axis(0), &is);
            let v_context = self.w_context.select(Axis(0), &js);
            let b_tok = self.b_tokens.select(Axis(0), &is);
            let b_context = self.b_context.select(Axis(0), &js);

            let dp = (&v_tok * &v_context).sum_axis(Axis(1));
            let diff = dp + &b_tok + &b_context - xs.mapv(f32::ln);
            let fx = xs.mapv(|x| Glove::weighting(x, params.x_max, params.alpha));

            loss_sum += 0.5 * (&fx * &diff.mapv(|d| d * d)).mean().unwrap_or(0.0);
            n_batches += 1;

            let fdiff = &fx * &diff;
            let fdiff_col = fdiff.view().insert_axis(Axis(1));
            let grad_tok = &v_context * &fdiff_col;
            let grad_context = &v_tok * &fdiff_col;

            // update by index, rows can repeat inside a batch
            for (k, (&i, &j)) in is.iter().zip(&js).enumerate() {

                let g = grad_tok.row(k);
                let step = &g / &self.ag_w_tok.row(i).mapv(f32::sqrt) * lr;
                self.w_tokens.row_mut(i).scaled_add(-1.0, &step);
                self.ag_w_tok.row_mut(i).zip_mut_with(&g, |a, g| *a += g * g);

                let g = grad_context.row(k);
                let step = &g / &self.ag_w_context.row(j).mapv(f32::sqrt) * lr;
                self.w_context.row_mut(j).scaled_add(-1.0, &step);
                self.ag_w_context.row_mut(j).zip_mut_with(&g, |a, g| *a += g * g);

                let gb = fdiff[k];
                self.b_tokens[i] -= lr * gb / self.ag_b_tok[i].sqrt();
                self.b_context[j] -= lr * gb / self.ag_b_context[j].sqrt();
                self.ag_b_tok[i] += gb * gb;
                self.ag_b_context[j] += gb * gb;
            }
        }

        (loss_sum, n_batches)
    }

    /// Trains on `cooc` and returns word + context vectors.
    pub fn fit(cooc: &Cooccurrences, params: &TrainParams) -> Result<(WordVectors, TrainReport)> {

        let vocab_size = cooc.vocab.len();
        for slice in &cooc.slices {
            let out_of_range = slice.rows().into_iter().any(|r| r[0] as usize >= vocab_size || r[1] as usize >= vocab_size);
            if slice.dim().1 != 3 || out_of_range {
                return Err(Error::InvalidModel("co-occurrence slice does not match the vocabulary".to_string()));
            }
        }

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let slices = cooc.slices.iter().map(Glove::symmetric).collect::<Result<Vec<Array2<f32>>>>()?;
        let mut glove = Glove::new(vocab_size, params.embedding_dim, &mut rng);
        let mut report = TrainReport::default();

        for epoch in 0..params.max_iter {

            let timer = Instant::now();

            // shuffle the slices order, rows are shuffled within each slice
            let mut slices_order: Vec<usize> = (0..slices.len()).collect();
            slices_order.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            let mut n_batches = 0;
            for (rr, m) in slices_order.into_iter().enumerate() {
                debug!("in slice {} / {}, number of examples: {}", rr + 1, slices.len(), slices[m].dim().0);
                let (slice_loss, slice_batches) = glove.train_slice(&slices[m], params, &mut rng);
                loss_sum += slice_loss;
                n_batches += slice_batches;
            }

            let epoch_loss = if n_batches > 0 { loss_sum / n_batches as f32 } else { 0.0 };
            info!("finished epoch {}, loss is {}, took {} ms", epoch, epoch_loss, timer.elapsed().as_millis());
            report.epoch_losses.push(epoch_loss);
        }

        let w = &glove.w_tokens + &glove.w_context;
        Ok((WordVectors::new(w, cooc.vocab.clone())?, report))
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::cooccurrence::Counts;
    use crate::embedding::EmbeddingModel;
    use ndarray::array;

    fn corpus() -> Vec<Vec<String>> {
        let lines = [
            "the dog chased the cat around the garden.",
            "the cat chased the mouse around the house.",
            "a puppy is a young dog and a kitten is a young cat.",
            "the dog and the puppy sleep in the garden.",
            "the cat and the kitten sleep in the house.",
        ];
        (0..20).flat_map(|_| lines.iter().flat_map(|l| Counts::parse_line(l))).collect()
    }

    fn params() -> TrainParams {
        TrainParams {
            min_count: 1,
            embedding_dim: 10,
            max_iter: 30,
            batch_size: 8,
            num_threads: 1,
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn symmetric_mirrors_pairs() {
        let slice = array![[0.0, 1.0, 2.5], [2.0, 0.0, 1.0]];
        let sym = Glove::symmetric(&slice).unwrap();
        assert_eq!(sym, array![[0.0, 1.0, 2.5], [2.0, 0.0, 1.0], [1.0, 0.0, 2.5], [0.0, 2.0, 1.0]]);
    }

    #[test]
    fn weighting_caps_at_one() {
        assert_eq!(Glove::weighting(200.0, 100.0, 0.75), 1.0);
        assert!((Glove::weighting(50.0, 100.0, 1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn training_reduces_loss() {
        let params = params();
        let cooc = Counts::run("toy", &corpus(), &params).unwrap();
        let (vectors, report) = Glove::fit(&cooc, &params).unwrap();

        assert_eq!(vectors.len(), cooc.vocab.len());
        assert_eq!(vectors.embedding_dim(), 10);
        assert!(vectors.weights().iter().all(|v| v.is_finite()));
        assert_eq!(report.epoch_losses.len(), 30);
        assert!(report.epoch_losses.last() < report.epoch_losses.first());
        assert!(vectors.most_similar("dog", 3).is_ok());
    }

    #[test]
    fn seeded_training_is_reproducible() {
        let params = TrainParams { max_iter: 3, ..params() };
        let cooc = Counts::run("toy", &corpus(), &params).unwrap();
        let (first, _) = Glove::fit(&cooc, &params).unwrap();
        let (second, _) = Glove::fit(&cooc, &params).unwrap();
        assert_eq!(first.weights(), second.weights());
    }

    #[test]
    fn rejects_slices_outside_vocabulary() {
        let cooc = Cooccurrences { vocab: vec!["a".to_string()], slices: vec![array![[0.0, 4.0, 1.0]]] };
        assert!(matches!(Glove::fit(&cooc, &params()), Err(Error::InvalidModel(_))));
    }
}
