//! Tests for feature rasterization.

use renderer::raster::{DrawRequest, Rasterizer, RenderError};
use renderer::style::StyleDescriptor;
use wfs_common::feature::{Feature, FeatureCollection, Geometry, Position};
use wfs_common::{BoundingBox, CrsCode};

fn square(min: f64, max: f64) -> Geometry {
    Geometry::Polygon {
        coordinates: vec![vec![
            Position::new(min, min),
            Position::new(max, min),
            Position::new(max, max),
            Position::new(min, max),
            Position::new(min, min),
        ]],
    }
}

fn sample_features() -> FeatureCollection {
    FeatureCollection::with_features(
        CrsCode::Epsg3067,
        vec![
            Feature::new(square(20.0, 80.0)).with_id("area.1"),
            Feature::new(Geometry::LineString {
                coordinates: vec![Position::new(0.0, 0.0), Position::new(100.0, 100.0)],
            }),
            Feature::new(Geometry::Point {
                coordinates: Position::new(10.0, 90.0),
            }),
        ],
    )
}

fn request<'a>(
    style: Option<&'a StyleDescriptor>,
    features: &'a FeatureCollection,
) -> DrawRequest<'a> {
    DrawRequest {
        crs: CrsCode::Epsg3067,
        width: Some(256),
        height: Some(256),
        location: Some(BoundingBox::new(0.0, 0.0, 100.0, 100.0)),
        style,
        features,
    }
}

#[test]
fn test_draw_features() {
    let style = StyleDescriptor::builtin_default().unwrap();
    let features = sample_features();

    let image = Rasterizer::default().draw(&request(Some(&style), &features)).unwrap();
    assert_eq!((image.width, image.height), (256, 256));
    assert!(!image.is_blank());

    // Centre of the polygon carries the default fill colour
    let [r, g, b, a] = image.pixel(128, 100).unwrap();
    assert!(a > 0);
    assert!(r > 200 && g > 180 && b < 60, "unexpected fill {:?}", (r, g, b));

    // Outside the polygon, away from the line and the point
    assert_eq!(image.pixel(250, 128).unwrap()[3], 0);
}

#[test]
fn test_empty_collection_renders_blank() {
    let style = StyleDescriptor::builtin_default().unwrap();
    let features = FeatureCollection::new(CrsCode::Epsg3067);

    let image = Rasterizer::default().draw(&request(Some(&style), &features)).unwrap();
    assert_eq!((image.width, image.height), (256, 256));
    assert!(image.is_blank());
}

#[test]
fn test_missing_prerequisites_fail_independently() {
    let style = StyleDescriptor::builtin_default().unwrap();
    let features = sample_features();
    let rasterizer = Rasterizer::default();

    let mut no_width = request(Some(&style), &features);
    no_width.width = None;
    assert_eq!(rasterizer.draw(&no_width), Err(RenderError::MissingWidth));

    let mut no_height = request(Some(&style), &features);
    no_height.height = None;
    assert_eq!(rasterizer.draw(&no_height), Err(RenderError::MissingHeight));

    let mut no_location = request(Some(&style), &features);
    no_location.location = None;
    assert_eq!(rasterizer.draw(&no_location), Err(RenderError::MissingLocation));

    let no_style = request(None, &features);
    assert_eq!(rasterizer.draw(&no_style), Err(RenderError::MissingStyle));
}

#[test]
fn test_degenerate_bounds_fail() {
    let style = StyleDescriptor::builtin_default().unwrap();
    let features = sample_features();

    let mut flat = request(Some(&style), &features);
    flat.location = Some(BoundingBox::new(0.0, 10.0, 100.0, 10.0));
    assert_eq!(
        Rasterizer::default().draw(&flat),
        Err(RenderError::DegenerateBounds)
    );
}

#[test]
fn test_zero_size_fails() {
    let style = StyleDescriptor::builtin_default().unwrap();
    let features = sample_features();

    let mut zero = request(Some(&style), &features);
    zero.width = Some(0);
    assert!(matches!(
        Rasterizer::default().draw(&zero),
        Err(RenderError::InvalidDimensions { .. })
    ));
}

#[test]
fn test_rule_geometry_property_filters_features() {
    let style = StyleDescriptor::from_json(
        r##"{
            "name": "only_geom",
            "rules": [
                { "geometry_property": "the_geom", "fill": { "color": "#ff0000" } }
            ]
        }"##,
    )
    .unwrap();

    let other = FeatureCollection::with_features(
        CrsCode::Epsg3067,
        vec![Feature::new(square(20.0, 80.0)).with_geometry_name("other")],
    );
    let image = Rasterizer::default().draw(&request(Some(&style), &other)).unwrap();
    assert!(image.is_blank());

    let matching = FeatureCollection::with_features(
        CrsCode::Epsg3067,
        vec![Feature::new(square(20.0, 80.0)).with_geometry_name("the_geom")],
    );
    let image = Rasterizer::default().draw(&request(Some(&style), &matching)).unwrap();
    assert_eq!(image.pixel(128, 128).unwrap(), [255, 0, 0, 255]);
}

#[test]
fn test_renders_are_independent() {
    let style = StyleDescriptor::builtin_highlight().unwrap();
    let features = sample_features();
    let rasterizer = Rasterizer::default();

    let first = rasterizer.draw(&request(Some(&style), &features)).unwrap();
    let second = rasterizer.draw(&request(Some(&style), &features)).unwrap();
    assert_eq!(first, second);
}
