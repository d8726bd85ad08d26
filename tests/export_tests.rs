use byteorder::{BigEndian, ByteOrder, LittleEndian};
use mlp_export::binary::write_atomic;
use mlp_export::idx::IMAGE_PIXELS;
use mlp_export::{
    export_images, export_labels, export_pair, export_weights, load_checkpoint, load_weights,
    save_checkpoint, verify_sample, ExportError, Image, ImageLabelSample, ParameterSet, Topology,
};
use rand::Rng;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Decodes a weight file the way the C reader does: consecutive floats,
/// shapes known in advance.
fn read_floats(path: &Path) -> Vec<f32> {
    let bytes = fs::read(path).unwrap();
    assert_eq!(bytes.len() % 4, 0);
    let mut floats = vec![0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(&bytes, &mut floats);
    floats
}

fn header(bytes: &[u8], fields: usize) -> Vec<i32> {
    (0..fields)
        .map(|i| BigEndian::read_i32(&bytes[i * 4..i * 4 + 4]))
        .collect()
}

fn distinct_image(i: usize) -> Image {
    let mut image = [0u8; IMAGE_PIXELS];
    for (p, px) in image.iter_mut().enumerate() {
        *px = ((i * 31 + p) % 256) as u8;
    }
    image
}

#[test]
fn arithmetic_sequence_round_trips_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mnist_weights.bin");
    let topo = Topology::mnist_mlp();
    let mut next = 0u32;
    let params = ParameterSet::from_fn(&topo, |_, _| {
        next += 1;
        next as f32 * 0.001 - 50.0
    });
    export_weights(&params, &path).unwrap();

    let floats = read_floats(&path);
    let expected: Vec<f32> = params.tensors().flatten().copied().collect();
    assert_eq!(floats.len(), expected.len());
    for (a, b) in floats.iter().zip(&expected) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    assert_eq!(load_weights(&path, &topo).unwrap(), params);
}

#[test]
fn random_parameters_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.bin");
    let topo = Topology::mnist_mlp();
    let mut rng = rand::thread_rng();
    let params = ParameterSet::from_fn(&topo, |_, _| rng.gen_range(-1.0f32..1.0));
    export_weights(&params, &path).unwrap();

    let reloaded = load_weights(&path, &topo).unwrap();
    for (a, b) in reloaded.tensors().zip(params.tensors()) {
        assert!(a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}

#[test]
fn weight_file_size_follows_topology() {
    let dir = tempfile::tempdir().unwrap();
    for sizes in [&[784, 128, 64, 10][..], &[10, 5, 2][..], &[3, 1][..]] {
        let topo = Topology::from_sizes(sizes);
        let path = dir.path().join(format!("w{}.bin", sizes.len()));
        mlp_export::export_with_topology(&ParameterSet::zeros(&topo), &topo, &path).unwrap();
        let expected = 4 * topo.param_count() as u64;
        assert_eq!(fs::metadata(&path).unwrap().len(), expected);
    }
    assert_eq!(Topology::mnist_mlp().weight_file_len(), 436_744);
}

#[test]
fn weights1_ones_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.bin");
    let topo = Topology::mnist_mlp();
    let params = ParameterSet::from_fn(&topo, |t, _| if t == 0 { 1.0 } else { 0.0 });
    export_weights(&params, &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(LittleEndian::read_f32(&bytes[0..4]), 1.0);
    let bias1 = 4 * 784 * 128;
    assert_eq!(LittleEndian::read_f32(&bytes[bias1 - 4..bias1]), 1.0);
    assert_eq!(LittleEndian::read_f32(&bytes[bias1..bias1 + 4]), 0.0);
}

#[test]
fn wrong_shapes_are_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.bin");
    let params = ParameterSet::zeros(&Topology::from_sizes(&[784, 100, 64, 10]));
    let err = export_weights(&params, &path).unwrap_err();
    match err {
        ExportError::ShapeMismatch {
            tensor,
            expected,
            actual,
        } => {
            assert_eq!(tensor, "weights1");
            assert_eq!(expected, 784 * 128);
            assert_eq!(actual, 784 * 100);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!path.exists());
}

#[test]
fn two_blank_images_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let ip = dir.path().join("t10k-images-idx3-ubyte");
    let lp = dir.path().join("t10k-labels-idx1-ubyte");
    export_images(&[[0; IMAGE_PIXELS]; 2], &ip).unwrap();
    export_labels(&[3, 7], &lp).unwrap();

    let images = fs::read(&ip).unwrap();
    assert_eq!(header(&images, 4), [0x803, 2, 28, 28]);
    assert_eq!(images.len(), 16 + 2 * 784);
    assert!(images[16..].iter().all(|&b| b == 0));

    let labels = fs::read(&lp).unwrap();
    assert_eq!(header(&labels, 2), [0x801, 2]);
    assert_eq!(&labels[8..], &[3, 7]);

    let report = verify_sample(&ip, &lp).unwrap();
    assert_eq!((report.count, report.rows, report.cols), (2, 28, 28));
}

#[test]
fn idx_sizes_and_headers_for_various_counts() {
    let dir = tempfile::tempdir().unwrap();
    for n in [0usize, 1, 17, 100] {
        let ip = dir.path().join(format!("images{n}"));
        let lp = dir.path().join(format!("labels{n}"));
        let images: Vec<Image> = (0..n).map(distinct_image).collect();
        let labels: Vec<u8> = (0..n).map(|i| (i % 10) as u8).collect();
        export_pair(&images, &labels, &ip, &lp).unwrap();

        let image_bytes = fs::read(&ip).unwrap();
        let label_bytes = fs::read(&lp).unwrap();
        assert_eq!(image_bytes.len(), 16 + n * 784);
        assert_eq!(label_bytes.len(), 8 + n);
        assert_eq!(header(&image_bytes, 4), [0x803, n as i32, 28, 28]);
        assert_eq!(header(&label_bytes, 2), [0x801, n as i32]);
    }
}

#[test]
fn image_and_label_positions_stay_aligned() {
    let dir = tempfile::tempdir().unwrap();
    let ip = dir.path().join("images");
    let lp = dir.path().join("labels");
    let n = 100;
    let images: Vec<Image> = (0..n).map(distinct_image).collect();
    let labels: Vec<u8> = (0..n).map(|i| ((i * 7) % 10) as u8).collect();
    let sample = ImageLabelSample::new(images.clone(), labels.clone()).unwrap();
    mlp_export::export_sample(&sample, &ip, &lp).unwrap();

    let image_bytes = fs::read(&ip).unwrap();
    let label_bytes = fs::read(&lp).unwrap();
    for i in 0..n {
        let start = 16 + i * IMAGE_PIXELS;
        assert_eq!(&image_bytes[start..start + IMAGE_PIXELS], &images[i][..]);
        assert_eq!(label_bytes[8 + i], labels[i]);
    }
}

#[test]
fn interrupted_write_leaves_no_partial_idx_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("images");
    // A valid header promising 10 images, then a failure after one.
    let result = write_atomic(&path, |w| {
        w.write_all(&[0, 0, 8, 3, 0, 0, 0, 10, 0, 0, 0, 28, 0, 0, 0, 28])?;
        w.write_all(&[0u8; IMAGE_PIXELS])?;
        Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
    });
    assert!(matches!(result, Err(ExportError::Io { .. })));
    assert!(!path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn failed_rename_keeps_target_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    // A directory at the target path makes the final rename fail.
    let path = dir.path().join("mnist_weights.bin");
    fs::create_dir(&path).unwrap();
    let err = export_weights(&ParameterSet::zeros(&Topology::mnist_mlp()), &path).unwrap_err();
    assert!(matches!(err, ExportError::Io { .. }));
    assert!(path.is_dir());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[cfg(unix)]
#[test]
fn exported_weights_stay_readable_by_other_users() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mnist_weights.bin");
    fs::write(&path, b"stale").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    export_weights(&ParameterSet::zeros(&Topology::mnist_mlp()), &path).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o044, 0o044);
    assert_eq!(fs::metadata(&path).unwrap().len(), 436_744);
}

#[test]
fn checkpoint_to_weight_file() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("mnist_model.pere");
    let weights = dir.path().join("mnist_weights.bin");
    let topo = Topology::mnist_mlp();
    let params = ParameterSet::from_fn(&topo, |t, i| ((t + 1) * 10_000 + i) as f32 / 1024.0);
    save_checkpoint(&params, &checkpoint).unwrap();

    let loaded = load_checkpoint(&checkpoint).unwrap();
    export_weights(&loaded, &weights).unwrap();
    assert_eq!(load_weights(&weights, &topo).unwrap(), params);
}
