//! File input and output helpers for terrain data.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read, Write};

use geo_types::{MultiPolygon, Polygon};
use geojson::GeoJson;
use roxmltree::Document;

use crate::dtm::Tin;
use crate::geometry::Point3;
use crate::raster::RasterTile;

/// Reads a file to string.
pub fn read_to_string(path: &str) -> io::Result<String> {
    let mut buffer = String::new();
    File::open(path)?.read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Writes a string to a file, replacing any previous content.
pub fn write_string(path: &str, contents: &str) -> io::Result<()> {
    File::create(path)?.write_all(contents.as_bytes())
}

/// Reads an ESRI ASCII grid into a [`RasterTile`].
///
/// Header keys are case-insensitive. Corner-registered origins
/// (`xllcorner`/`yllcorner`) are shifted by half a cell so the tile always
/// addresses cell centers. A `NODATA_value` marker is accepted and its
/// sentinel left in the data untouched.
pub fn read_esri_ascii(path: &str) -> io::Result<RasterTile> {
    let text = read_to_string(path)?;
    let mut ncols = None;
    let mut nrows = None;
    let mut x_origin = None;
    let mut y_origin = None;
    let mut cellsize = None;
    let mut x_corner = false;
    let mut y_corner = false;
    let mut tokens = text.split_whitespace().peekable();
    while let Some(&token) = tokens.peek() {
        if token.parse::<f64>().is_ok() {
            break;
        }
        let key = token.to_ascii_lowercase();
        tokens.next();
        let value: f64 = tokens.next().and_then(|v| v.parse().ok()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad esri ascii header entry {key}"),
            )
        })?;
        match key.as_str() {
            "ncols" => ncols = Some(value as usize),
            "nrows" => nrows = Some(value as usize),
            "xllcorner" => {
                x_origin = Some(value);
                x_corner = true;
            }
            "xllcenter" => {
                x_origin = Some(value);
                x_corner = false;
            }
            "yllcorner" => {
                y_origin = Some(value);
                y_corner = true;
            }
            "yllcenter" => {
                y_origin = Some(value);
                y_corner = false;
            }
            "cellsize" => cellsize = Some(value),
            "nodata_value" => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown esri ascii header key {key}"),
                ))
            }
        }
    }
    let missing = |field: &str| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("esri ascii header missing {field}"),
        )
    };
    let ncols = ncols.ok_or_else(|| missing("ncols"))?;
    let nrows = nrows.ok_or_else(|| missing("nrows"))?;
    let cellsize = cellsize.ok_or_else(|| missing("cellsize"))?;
    let mut x_min = x_origin.ok_or_else(|| missing("xllcorner"))?;
    let mut y_ll = y_origin.ok_or_else(|| missing("yllcorner"))?;
    if x_corner {
        x_min += cellsize / 2.0;
    }
    if y_corner {
        y_ll += cellsize / 2.0;
    }
    let data = tokens
        .map(|t| {
            t.parse::<f64>().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad elevation value {t}"),
                )
            })
        })
        .collect::<io::Result<Vec<f64>>>()?;
    let y_max = y_ll + (nrows as f64 - 1.0) * cellsize;
    RasterTile::new(x_min, y_max, cellsize, cellsize, ncols, nrows, data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Writes a [`RasterTile`] as an ESRI ASCII grid, cell-center registered.
pub fn write_esri_ascii(path: &str, tile: &RasterTile) -> io::Result<()> {
    if tile.delta_x != tile.delta_y {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "esri ascii grids need square cells",
        ));
    }
    let mut text = String::new();
    writeln!(&mut text, "ncols {}", tile.num_points_x).unwrap();
    writeln!(&mut text, "nrows {}", tile.num_points_y).unwrap();
    writeln!(&mut text, "xllcenter {}", tile.x_min).unwrap();
    writeln!(&mut text, "yllcenter {}", tile.y_min()).unwrap();
    writeln!(&mut text, "cellsize {}", tile.delta_x).unwrap();
    for row in 0..tile.num_points_y {
        let line: Vec<String> = (0..tile.num_points_x)
            .map(|col| tile.value(row, col).to_string())
            .collect();
        writeln!(&mut text, "{}", line.join(" ")).unwrap();
    }
    write_string(path, &text)
}

/// Reads a LandXML file containing a surface and returns it as a [`Tin`].
pub fn read_landxml_surface(path: &str) -> io::Result<Tin> {
    let xml = read_to_string(path)?;
    let doc = Document::parse(&xml).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut vertices = Vec::new();
    if let Some(pnts) = doc.descendants().find(|n| n.has_tag_name("Pnts")) {
        for p in pnts.children().filter(|c| c.has_tag_name("P")) {
            if let Some(text) = p.text() {
                let nums: Vec<f64> = text
                    .split_whitespace()
                    .filter_map(|s| s.parse().ok())
                    .collect();
                if nums.len() >= 3 {
                    vertices.push(Point3::new(nums[0], nums[1], nums[2]));
                }
            }
        }
    }
    let mut faces = Vec::new();
    if let Some(elems) = doc.descendants().find(|n| n.has_tag_name("Faces")) {
        for f in elems.children().filter(|c| c.has_tag_name("F")) {
            if let Some(text) = f.text() {
                let nums: Vec<usize> = text
                    .split_whitespace()
                    .filter_map(|s| s.parse().ok())
                    .collect();
                if nums.len() >= 3 && nums[..3].iter().all(|&n| n >= 1) {
                    faces.push([nums[0] - 1, nums[1] - 1, nums[2] - 1]);
                }
            }
        }
    }
    Ok(Tin { vertices, faces })
}

/// Writes a [`Tin`] to a LandXML surface file.
pub fn write_landxml_surface(path: &str, tin: &Tin) -> io::Result<()> {
    let mut xml = String::new();
    writeln!(&mut xml, "<?xml version=\"1.0\"?>").unwrap();
    writeln!(&mut xml, "<LandXML>").unwrap();
    writeln!(&mut xml, "  <Surfaces>").unwrap();
    writeln!(&mut xml, "    <Surface name=\"TIN\">").unwrap();
    writeln!(&mut xml, "      <Definition surfType=\"TIN\">").unwrap();
    writeln!(&mut xml, "        <Pnts>").unwrap();
    for (i, v) in tin.vertices.iter().enumerate() {
        writeln!(
            &mut xml,
            "          <P id=\"{}\">{} {} {}</P>",
            i + 1,
            v.x,
            v.y,
            v.z
        )
        .unwrap();
    }
    writeln!(&mut xml, "        </Pnts>").unwrap();
    writeln!(&mut xml, "        <Faces>").unwrap();
    for f in &tin.faces {
        writeln!(
            &mut xml,
            "          <F>{} {} {}</F>",
            f[0] + 1,
            f[1] + 1,
            f[2] + 1
        )
        .unwrap();
    }
    writeln!(&mut xml, "        </Faces>").unwrap();
    writeln!(&mut xml, "      </Definition>").unwrap();
    writeln!(&mut xml, "    </Surface>").unwrap();
    writeln!(&mut xml, "  </Surfaces>").unwrap();
    writeln!(&mut xml, "</LandXML>").unwrap();
    write_string(path, &xml)
}

/// Reads the first polygon out of a GeoJSON file. Feature and
/// FeatureCollection wrappers are unwrapped; a MultiPolygon contributes its
/// first member.
pub fn read_boundary_geojson(path: &str) -> io::Result<Polygon<f64>> {
    let text = read_to_string(path)?;
    let geojson = text
        .parse::<GeoJson>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let polygon = match &geojson {
        GeoJson::Geometry(geometry) => polygon_from_value(&geometry.value),
        GeoJson::Feature(feature) => feature
            .geometry
            .as_ref()
            .and_then(|g| polygon_from_value(&g.value)),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .filter_map(|f| polygon_from_value(&f.geometry.as_ref()?.value))
            .next(),
    };
    polygon.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            "no polygon geometry in geojson",
        )
    })
}

fn polygon_from_value(value: &geojson::Value) -> Option<Polygon<f64>> {
    match value {
        geojson::Value::Polygon(_) => Polygon::try_from(value.clone()).ok(),
        geojson::Value::MultiPolygon(_) => MultiPolygon::try_from(value.clone())
            .ok()
            .and_then(|mp| mp.0.into_iter().next()),
        _ => None,
    }
}

/// Writes a [`Tin`] as pretty JSON with `vertices` and `faces` arrays.
pub fn write_tin_json(path: &str, tin: &Tin) -> io::Result<()> {
    let json = serde_json::to_string_pretty(tin).map_err(io::Error::other)?;
    write_string(path, &json)
}
