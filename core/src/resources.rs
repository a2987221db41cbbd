/*  This file is part of hps-conditions, the conditions database layer of the HPS experiment software.
    Copyright in each year of 2013-2015 inclusive, and 2026, the HPS Collaboration.
    hps-conditions is free software, distributed under the GNU Affero General Public License as published by
    the Free Software Foundation; see the file LICENSE for license version and details.
    hps-conditions is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
    You should have received a copy of the GNU Affero General Public License along with hps-conditions.  If not, see <http://www.gnu.org/licenses/>
*/
//! Files compiled into the library, addressed like classpath resources.

const RESOURCES: &[(&str, &str)] = &[
    (
        "/config/conditions_database.xml",
        include_str!("../resources/config/conditions_database.xml"),
    ),
    (
        "/config/conditions_dev.properties",
        include_str!("../resources/config/conditions_dev.properties"),
    ),
    (
        "/detectors/HPS-TestRun-v5/compact.xml",
        include_str!("../resources/detectors/HPS-TestRun-v5/compact.xml"),
    ),
];

/// The leading slash is optional.
pub fn find_resource(name: &str) -> Option<&'static str> {
    let name = name.trim_start_matches('/');
    RESOURCES
        .iter()
        .find(|(path, _)| path.trim_start_matches('/') == name)
        .map(|(_, text)| *text)
}

pub fn resource_names() -> impl Iterator<Item = &'static str> {
    RESOURCES.iter().map(|(path, _)| *path)
}
