//! Clustering primitives behind model selection.
//!
//! ## Hard vs Soft Clustering
//!
//! **Hard clustering** assigns each item to exactly one cluster. Agglomerative
//! clustering and k-means are only used here to produce a *starting*
//! partition.
//!
//! **Soft clustering** gives each item a probability distribution over
//! clusters. The Gaussian mixture is the model that is actually selected; its
//! responsibilities are seeded with a one-hot encoding of a hard partition.
//!
//! ## Algorithms
//!
//! ### Gaussian Mixture Model (GMM)
//!
//! Models data as a mixture of k Gaussian distributions:
//!
//! ```text
//! P(x) = Σ π_k × N(x | μ_k, Σ_k)
//! ```
//!
//! Where π_k is the mixture weight (probability of cluster k), and N is the
//! Gaussian density with mean μ_k and covariance Σ_k. Σ_k may be spherical,
//! diagonal, shared (tied) or unconstrained (full).
//!
//! ### K-means
//!
//! Assign each point to the nearest centroid, then update centroids to the
//! mean of their points. Repeat. Used as the starting partition when no
//! agglomerative affinity is requested.
//!
//! ### Hierarchical (Agglomerative) Clustering
//!
//! Bottom-up: start with each point as its own cluster, repeatedly merge
//! the two closest clusters until one remains. The merge history forms a
//! **dendrogram**; replaying its first `n − k` merges gives k clusters, so one
//! tree serves every component count of the grid.
//!
//! **Linkage methods** determine "distance between clusters":
//!
//! | Linkage | Distance | Effect |
//! |---------|----------|--------|
//! | Single | min(pairwise) | Chaining; elongated clusters |
//! | Complete | max(pairwise) | Compact, spherical clusters |
//! | Average | mean(pairwise) | Balanced compromise |
//! | Ward | Variance increase | Minimizes within-cluster variance (euclidean only) |
//!
//! ## Usage
//!
//! ```rust
//! use gmm_ic::cluster::{Clustering, Gmm, HierarchicalClustering, Init, Kmeans};
//! use ndarray::array;
//!
//! let data = array![[0.0, 0.0], [0.1, 0.1], [0.2, 0.0], [10.0, 10.0], [10.1, 10.1], [10.2, 10.0]];
//!
//! let labels = Kmeans::new(2).with_seed(0).fit_predict(data.view()).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[3]);
//!
//! let start = HierarchicalClustering::new(2).fit_predict(data.view()).unwrap();
//! let model = Gmm::new()
//!     .with_n_components(2)
//!     .fit(data.view(), &Init::Labels(start))
//!     .unwrap();
//! let probs = model.predict_proba(data.view()).unwrap();
//! assert_eq!(probs.dim(), (6, 2));
//! ```

mod dendrogram;
mod gmm;
mod hierarchical;
mod kmeans;
mod traits;

pub use dendrogram::{Dendrogram, Merge};
pub use gmm::{CovarianceType, Covariances, Gmm, GmmModel, Init};
pub use hierarchical::{Affinity, HierarchicalClustering, Linkage, ZERO_VECTOR_COSINE_DISTANCE};
pub use kmeans::Kmeans;
pub use traits::{one_hot, relabel_by_appearance, Clustering, SoftClustering};
